use serde::Serialize;
use std::time::Instant;

/// Serializable snapshot of one finished (or interrupted) session,
/// written by the CLI as a JSON trace.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub duration_ms: u64,
    pub payloads: u64,
    pub payload_bytes: u64,
    pub packets_sent: u64,
    pub retransmissions: u64,
    pub discarded: u64,
    pub throughput_mbps: f64,
}

/// Running throughput meter over delivered (or acknowledged) payload bytes.
///
/// Observability only; the state machines never branch on it.
#[derive(Debug)]
pub struct Throughput {
    started: Instant,
    payloads: u64,
    bytes: u64,
}

impl Throughput {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            payloads: 0,
            bytes: 0,
        }
    }

    pub fn record(&mut self, bytes: usize) {
        self.payloads += 1;
        self.bytes += bytes as u64;
    }

    pub fn payloads(&self) -> u64 {
        self.payloads
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Megabits per second since the meter started.
    pub fn mbps(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        (self.bytes as f64 * 8.0) / (elapsed * 1_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_accumulates() {
        let mut meter = Throughput::start();
        meter.record(512);
        meter.record(512);
        assert_eq!(meter.payloads(), 2);
        assert_eq!(meter.bytes(), 1024);
        assert!(meter.mbps() >= 0.0);
    }
}
