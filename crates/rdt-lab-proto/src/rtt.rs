//! Adaptive retransmission timeout, Jacobson/Karels style.
//!
//! One RTT sample is recorded per acknowledged data packet:
//!
//! ```text
//! first sample:  est = s            dev = s / 2
//! afterwards:    est' = (1-α)·est + α·s
//!                dev' = (1-β)·dev + β·|s − est'|
//! timeout:       est + 4·dev, floored at the configured minimum
//! ```
//!
//! Before the first sample the configured initial timeout is reported.
//! Samples are clamped up to a minimum floor so a coarse clock can never
//! feed a zero RTT into the estimate.

use crate::config::SessionConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RttEstimator {
    alpha: f64,
    beta: f64,
    initial_timeout: Duration,
    min_timeout: Duration,
    min_sample: Duration,
    estimated_rtt: Option<f64>,
    dev_rtt: f64,
}

impl RttEstimator {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            alpha: config.alpha,
            beta: config.beta,
            initial_timeout: config.initial_timeout(),
            min_timeout: config.min_timeout(),
            min_sample: config.min_rtt_sample(),
            estimated_rtt: None,
            dev_rtt: 0.0,
        }
    }

    /// Fold one measured round-trip into the estimate.
    pub fn record_sample(&mut self, sample: Duration) {
        let s = sample.max(self.min_sample).as_secs_f64();
        match self.estimated_rtt {
            None => {
                self.estimated_rtt = Some(s);
                self.dev_rtt = s / 2.0;
            }
            Some(prev) => {
                let est = (1.0 - self.alpha) * prev + self.alpha * s;
                self.dev_rtt = (1.0 - self.beta) * self.dev_rtt + self.beta * (s - est).abs();
                self.estimated_rtt = Some(est);
            }
        }
    }

    /// Current receive deadline for an outstanding packet.
    pub fn timeout(&self) -> Duration {
        match self.estimated_rtt {
            None => self.initial_timeout,
            Some(est) => Duration::from_secs_f64(est + 4.0 * self.dev_rtt).max(self.min_timeout),
        }
    }

    pub fn estimated_rtt(&self) -> Option<Duration> {
        self.estimated_rtt.map(Duration::from_secs_f64)
    }

    pub fn dev_rtt(&self) -> Option<Duration> {
        self.estimated_rtt
            .map(|_| Duration::from_secs_f64(self.dev_rtt))
    }
}
