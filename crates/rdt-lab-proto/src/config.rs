use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for one endpoint session.
///
/// Defaults reproduce the reference protocol: 512-byte payloads, 10%
/// simulated loss and corruption, a 10-retry budget, 1 s timeout before the
/// first RTT sample, a 50 ms timeout floor and a 1 ms RTT-sample floor, and
/// Jacobson/Karels smoothing constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Bytes of application payload per data packet.
    pub payload_size: usize,
    /// Probability that the channel emulator silently drops an inbound datagram.
    pub loss_prob: f64,
    /// Probability that the channel emulator treats an inbound packet as corrupted.
    pub corrupt_prob: f64,
    /// Seed for the emulator's RNG. Same seed, same fault sequence.
    pub seed: u64,
    /// Retransmissions allowed before the sender aborts the session.
    pub max_retries: u32,
    /// Receive deadline before any RTT sample exists.
    pub initial_timeout_ms: u64,
    /// Lower bound on the adaptive timeout, prevents timer thrash.
    pub min_timeout_ms: u64,
    /// Lower bound applied to measured RTT samples (clock granularity guard).
    pub min_rtt_sample_ms: u64,
    /// EWMA gain for the smoothed RTT.
    pub alpha: f64,
    /// EWMA gain for the RTT deviation.
    pub beta: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            payload_size: 512,
            loss_prob: 0.1,
            corrupt_prob: 0.1,
            seed: 0,
            max_retries: 10,
            initial_timeout_ms: 1000,
            min_timeout_ms: 50,
            min_rtt_sample_ms: 1,
            alpha: 0.125,
            beta: 0.25,
        }
    }
}

impl SessionConfig {
    pub fn initial_timeout(&self) -> Duration {
        Duration::from_millis(self.initial_timeout_ms)
    }

    pub fn min_timeout(&self) -> Duration {
        Duration::from_millis(self.min_timeout_ms)
    }

    pub fn min_rtt_sample(&self) -> Duration {
        Duration::from_millis(self.min_rtt_sample_ms)
    }
}

/// Partial config, typically parsed from a TOML file; unset fields keep the
/// values already in place.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfigOverride {
    pub payload_size: Option<usize>,
    pub loss_prob: Option<f64>,
    pub corrupt_prob: Option<f64>,
    pub seed: Option<u64>,
    pub max_retries: Option<u32>,
    pub initial_timeout_ms: Option<u64>,
    pub min_timeout_ms: Option<u64>,
    pub min_rtt_sample_ms: Option<u64>,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
}

impl SessionConfigOverride {
    pub fn apply_to(&self, config: &mut SessionConfig) {
        if let Some(v) = self.payload_size {
            config.payload_size = v;
        }
        if let Some(v) = self.loss_prob {
            config.loss_prob = v;
        }
        if let Some(v) = self.corrupt_prob {
            config.corrupt_prob = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.max_retries {
            config.max_retries = v;
        }
        if let Some(v) = self.initial_timeout_ms {
            config.initial_timeout_ms = v;
        }
        if let Some(v) = self.min_timeout_ms {
            config.min_timeout_ms = v;
        }
        if let Some(v) = self.min_rtt_sample_ms {
            config.min_rtt_sample_ms = v;
        }
        if let Some(v) = self.alpha {
            config.alpha = v;
        }
        if let Some(v) = self.beta {
            config.beta = v;
        }
    }
}
