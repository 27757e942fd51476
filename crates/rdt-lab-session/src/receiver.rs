//! Receive-side stop-and-wait loop.
//!
//! No explicit states beyond "waiting for the next datagram"; the only
//! protocol state is `expected_seq`. Every inbound datagram runs the same
//! gauntlet: channel-emulator verdict, decode, integrity check, sequence
//! check. Everything short of a valid in-order packet is discarded with no
//! reply, which is exactly what makes the sender time out and retransmit.
//!
//! The one subtlety is the duplicate path: a valid packet carrying the
//! *previous* sequence bit means our earlier ACK was lost. The payload is
//! not delivered again, but the ACK is repeated with the duplicate's own
//! bit (`1 - expected_seq`), otherwise a lost ACK would stall the sender
//! until its retry budget ran out.

use crate::error::SessionError;
use crate::report::{SessionReport, Throughput};
use crate::shutdown::ShutdownFlag;
use crate::transport::{Polled, Transport};
use bytes::Bytes;
use rdt_lab_proto::{ChannelEmulator, Packet, SessionConfig, Verdict, packet};
use std::time::Duration;
use tracing::{debug, info};

/// Bound on each blocking receive so the shutdown flag is observed.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct Receiver<T: Transport> {
    transport: T,
    channel: ChannelEmulator,
    expected_seq: u32,
    discarded: u64,
    meter: Throughput,
}

impl<T: Transport> Receiver<T> {
    pub fn new(transport: T, config: &SessionConfig) -> Self {
        Self::with_channel(transport, ChannelEmulator::from_config(config))
    }

    /// Construct with an explicit emulator, e.g. an ideal channel or one
    /// preloaded with deterministic faults.
    pub fn with_channel(transport: T, channel: ChannelEmulator) -> Self {
        Self {
            transport,
            channel,
            expected_seq: 0,
            discarded: 0,
            meter: Throughput::start(),
        }
    }

    /// Sequence bit the next in-order packet must carry.
    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }

    pub fn channel_mut(&mut self) -> &mut ChannelEmulator {
        &mut self.channel
    }

    /// Process at most one datagram.
    ///
    /// `Ok(Some(payload))` when a new in-order payload was accepted and
    /// acknowledged; `Ok(None)` when the wait timed out or the datagram was
    /// discarded (simulated fault, malformed framing, checksum mismatch, or
    /// an acknowledged duplicate).
    pub fn poll_once(&mut self) -> Result<Option<Bytes>, SessionError> {
        let bytes = match self.transport.recv_deadline(POLL_INTERVAL)? {
            Polled::TimedOut => return Ok(None),
            Polled::Datagram(bytes) => bytes,
        };

        // One verdict per datagram; the drop branch applies to the raw
        // bytes before any decode.
        let verdict = self.channel.verdict();
        if verdict == Verdict::Drop {
            self.discarded += 1;
            debug!(bytes = bytes.len(), "simulated loss, datagram dropped");
            return Ok(None);
        }

        let packet = match Packet::decode(&bytes) {
            Ok(packet) => packet,
            Err(err) => {
                self.discarded += 1;
                debug!(%err, "malformed datagram discarded");
                return Ok(None);
            }
        };

        if verdict == Verdict::Corrupt {
            self.discarded += 1;
            debug!(seq = packet.seq, "simulated corruption, packet discarded");
            return Ok(None);
        }
        if !packet.is_intact() {
            self.discarded += 1;
            debug!(seq = packet.seq, "checksum mismatch, packet discarded");
            return Ok(None);
        }

        if packet.seq == self.expected_seq {
            self.transport.send(&packet::encode_ack(packet.seq))?;
            self.meter.record(packet.payload.len());
            info!(
                seq = packet.seq,
                bytes = packet.payload.len(),
                throughput_mbps = self.meter.mbps(),
                "payload delivered"
            );
            self.expected_seq ^= 1;
            Ok(Some(packet.payload))
        } else {
            // Duplicate after a lost ACK: re-ACK with the bit the sender
            // is waiting on, never re-deliver.
            let ack = 1 - self.expected_seq;
            debug!(
                seq = packet.seq,
                expected = self.expected_seq,
                ack,
                "duplicate packet, repeating ack"
            );
            self.transport.send(&packet::encode_ack(ack))?;
            Ok(None)
        }
    }

    /// Serve until the shutdown flag is raised, handing each accepted
    /// payload to `deliver`.
    pub fn run(
        &mut self,
        stop: &ShutdownFlag,
        mut deliver: impl FnMut(Bytes),
    ) -> Result<SessionReport, SessionError> {
        while !stop.is_set() {
            if let Some(payload) = self.poll_once()? {
                deliver(payload);
            }
        }
        info!("shutdown requested, receiver stopping");
        Ok(self.report())
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            duration_ms: self.meter.elapsed_ms(),
            payloads: self.meter.payloads(),
            payload_bytes: self.meter.bytes(),
            packets_sent: 0,
            retransmissions: 0,
            discarded: self.discarded,
            throughput_mbps: self.meter.mbps(),
        }
    }
}
