//! Send-side stop-and-wait state machine.
//!
//! [`Sender::send`] runs one full stop-and-wait round: encode with the
//! current sequence bit, transmit, and block until the matching ACK arrives
//! or the retry budget runs out. At most one payload is logically in flight;
//! the next payload is not accepted until the current one is acknowledged
//! or the session aborts.
//!
//! State walk per round: `Idle → AwaitingAck → (Idle | Aborted)`.
//! Stale or undecodable ACKs are discarded while waiting and do **not**
//! restart the receive deadline; only a timeout does, by retransmitting.

use crate::error::SessionError;
use crate::report::{SessionReport, Throughput};
use crate::transport::{Polled, Transport};
use rdt_lab_proto::{RttEstimator, SessionConfig, packet};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What one successful round looked like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    /// Transmissions of this payload, 1 = no retransmission was needed.
    pub attempts: u32,
    /// The round-trip sample fed to the timeout estimator (already clamped
    /// by the estimator before use).
    pub rtt: Duration,
}

pub struct Sender<T: Transport> {
    transport: T,
    config: SessionConfig,
    rtt: RttEstimator,
    next_seq: u32,
    packets_sent: u64,
    retransmissions: u64,
    meter: Throughput,
}

impl<T: Transport> Sender<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let rtt = RttEstimator::new(&config);
        Self {
            transport,
            config,
            rtt,
            next_seq: 0,
            packets_sent: 0,
            retransmissions: 0,
            meter: Throughput::start(),
        }
    }

    /// Sequence bit the next data packet will carry.
    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    /// Current receive deadline that will be armed for the next send.
    pub fn timeout(&self) -> Duration {
        self.rtt.timeout()
    }

    /// Reliably deliver one payload, blocking through retransmissions.
    ///
    /// Returns `Err(SessionError::RetryBudgetExhausted)` once the packet has
    /// been transmitted `1 + max_retries` times without a matching ACK; the
    /// session is then aborted and the sender should not be reused.
    pub fn send(&mut self, payload: &[u8]) -> Result<SendOutcome, SessionError> {
        let frame = packet::encode(self.next_seq, payload);
        let mut attempts: u32 = 0;

        loop {
            self.transport.send(&frame)?;
            attempts += 1;
            self.packets_sent += 1;
            if attempts > 1 {
                self.retransmissions += 1;
            }
            let sent_at = Instant::now();
            let timeout = self.rtt.timeout();
            let deadline = sent_at + timeout;
            debug!(
                seq = self.next_seq,
                bytes = frame.len(),
                timeout_ms = timeout.as_millis() as u64,
                attempts,
                "packet sent"
            );

            if self.await_ack(deadline)? {
                let sample = sent_at.elapsed();
                self.rtt.record_sample(sample);
                self.meter.record(payload.len());
                info!(
                    seq = self.next_seq,
                    rtt_ms = sample.as_millis() as u64,
                    next_timeout_ms = self.rtt.timeout().as_millis() as u64,
                    throughput_mbps = self.meter.mbps(),
                    "ack received"
                );
                self.next_seq ^= 1;
                return Ok(SendOutcome {
                    attempts,
                    rtt: sample,
                });
            }

            if attempts > self.config.max_retries {
                warn!(
                    seq = self.next_seq,
                    attempts, "retry budget exhausted, aborting session"
                );
                return Err(SessionError::RetryBudgetExhausted { attempts });
            }
            debug!(seq = self.next_seq, attempts, "deadline expired, retransmitting");
        }
    }

    /// Wait for the ACK matching `next_seq` until `deadline`.
    ///
    /// `Ok(true)` on a matching ACK, `Ok(false)` on deadline expiry. Stale
    /// and undecodable ACKs burn time off the same deadline.
    fn await_ack(&mut self, deadline: Instant) -> Result<bool, SessionError> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.transport.recv_deadline(remaining)? {
                Polled::TimedOut => return Ok(false),
                Polled::Datagram(bytes) => match packet::decode_ack(&bytes) {
                    Ok(bit) if bit == self.next_seq => return Ok(true),
                    Ok(bit) => {
                        debug!(ack = bit, expected = self.next_seq, "stale ack discarded");
                    }
                    Err(err) => {
                        debug!(%err, "undecodable ack discarded");
                    }
                },
            }
        }
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            duration_ms: self.meter.elapsed_ms(),
            payloads: self.meter.payloads(),
            payload_bytes: self.meter.bytes(),
            packets_sent: self.packets_sent,
            retransmissions: self.retransmissions,
            discarded: 0,
            throughput_mbps: self.meter.mbps(),
        }
    }
}
