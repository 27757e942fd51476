//! Artificial fault injection for the unreliable channel.
//!
//! The emulator sits on the receive path and decides, per inbound datagram,
//! whether to pretend the datagram was lost or corrupted in transit. Both
//! decisions are independent Bernoulli draws from a seeded RNG, so a run is
//! reproducible given the same seed. Corruption is modeled as "treat this
//! otherwise-valid packet as invalid" rather than flipping payload bytes;
//! the receiver only ever branches on validity, so the behavior is the same.
//!
//! Tests can force the next datagram's fate deterministically with
//! [`ChannelEmulator::force_drop_next`] / [`ChannelEmulator::force_corrupt_next`].

use crate::config::SessionConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fate of one inbound datagram, evaluated once on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Deliver,
    Drop,
    Corrupt,
}

#[derive(Debug)]
pub struct ChannelEmulator {
    loss_prob: f64,
    corrupt_prob: f64,
    rng: StdRng,
    forced_drops: u32,
    forced_corruptions: u32,
}

impl ChannelEmulator {
    pub fn new(loss_prob: f64, corrupt_prob: f64, seed: u64) -> Self {
        Self {
            loss_prob,
            corrupt_prob,
            rng: StdRng::seed_from_u64(seed),
            forced_drops: 0,
            forced_corruptions: 0,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.loss_prob, config.corrupt_prob, config.seed)
    }

    /// A channel that never interferes.
    pub fn ideal() -> Self {
        Self::new(0.0, 0.0, 0)
    }

    /// Force the next datagram to be dropped, ahead of any random draw.
    pub fn force_drop_next(&mut self) {
        self.forced_drops += 1;
    }

    /// Force the next delivered datagram to be flagged corrupted.
    pub fn force_corrupt_next(&mut self) {
        self.forced_corruptions += 1;
    }

    /// Decide the fate of one inbound datagram.
    ///
    /// Loss is decided first (on the raw bytes, before any decode); the
    /// corruption draw only happens for datagrams that survive it.
    pub fn verdict(&mut self) -> Verdict {
        if self.should_drop() {
            Verdict::Drop
        } else if self.should_corrupt() {
            Verdict::Corrupt
        } else {
            Verdict::Deliver
        }
    }

    fn should_drop(&mut self) -> bool {
        if self.forced_drops > 0 {
            self.forced_drops -= 1;
            return true;
        }
        self.rng.random::<f64>() < self.loss_prob
    }

    fn should_corrupt(&mut self) -> bool {
        if self.forced_corruptions > 0 {
            self.forced_corruptions -= 1;
            return true;
        }
        self.rng.random::<f64>() < self.corrupt_prob
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ideal_channel_always_delivers() {
        let mut channel = ChannelEmulator::ideal();
        for _ in 0..1000 {
            assert_eq!(channel.verdict(), Verdict::Deliver);
        }
    }

    #[test]
    fn certain_loss_always_drops() {
        let mut channel = ChannelEmulator::new(1.0, 0.0, 7);
        for _ in 0..100 {
            assert_eq!(channel.verdict(), Verdict::Drop);
        }
    }

    #[test]
    fn certain_corruption_always_corrupts() {
        let mut channel = ChannelEmulator::new(0.0, 1.0, 7);
        for _ in 0..100 {
            assert_eq!(channel.verdict(), Verdict::Corrupt);
        }
    }

    #[test]
    fn same_seed_same_fault_sequence() {
        let mut a = ChannelEmulator::new(0.3, 0.3, 42);
        let mut b = ChannelEmulator::new(0.3, 0.3, 42);
        for _ in 0..200 {
            assert_eq!(a.verdict(), b.verdict());
        }
    }

    #[test]
    fn forced_faults_take_priority() {
        let mut channel = ChannelEmulator::ideal();
        channel.force_drop_next();
        channel.force_corrupt_next();
        assert_eq!(channel.verdict(), Verdict::Drop);
        assert_eq!(channel.verdict(), Verdict::Corrupt);
        assert_eq!(channel.verdict(), Verdict::Deliver);
    }
}
