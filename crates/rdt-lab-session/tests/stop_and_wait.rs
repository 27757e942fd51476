//! End-to-end stop-and-wait rounds over the in-memory paired transport.
//!
//! The sender runs on a spawned thread; the test thread either drives a
//! real [`Receiver`] or plays the peer by hand to inject exact fault
//! sequences.

use rdt_lab_proto::{ChannelEmulator, SessionConfig, packet};
use rdt_lab_session::transport::{Polled, Transport, memory};
use rdt_lab_session::{Receiver, SendOutcome, Sender, SessionError, ShutdownFlag};
use std::thread;
use std::time::{Duration, Instant};

fn fast_config() -> SessionConfig {
    SessionConfig {
        initial_timeout_ms: 50,
        ..Default::default()
    }
}

/// Drive `receiver` until `want` payloads have been accepted.
fn collect_payloads(
    receiver: &mut Receiver<memory::MemoryTransport>,
    want: usize,
) -> Vec<Vec<u8>> {
    let mut delivered = Vec::new();
    while delivered.len() < want {
        if let Some(payload) = receiver.poll_once().expect("receiver failed") {
            delivered.push(payload.to_vec());
        }
    }
    delivered
}

#[test]
fn clean_channel_delivers_each_payload_exactly_once() {
    let (sender_side, receiver_side) = memory::pair();
    let payloads: Vec<&[u8]> = vec![b"alpha", b"bravo", b"charlie", b"delta"];

    let sent = payloads.clone();
    let sender_thread = thread::spawn(move || {
        let mut sender = Sender::new(sender_side, fast_config());
        sent.iter()
            .map(|p| sender.send(p).expect("send failed"))
            .collect::<Vec<SendOutcome>>()
    });

    let mut receiver = Receiver::with_channel(receiver_side, ChannelEmulator::ideal());
    let delivered = collect_payloads(&mut receiver, payloads.len());
    let outcomes = sender_thread.join().expect("sender panicked");

    assert_eq!(delivered, payloads);
    // Nothing was lost, so every round succeeds on the first transmission
    // and the expected bit has alternated back to its start parity.
    assert!(outcomes.iter().all(|o| o.attempts == 1));
    assert_eq!(receiver.expected_seq(), 0);
    assert_eq!(receiver.report().payloads, payloads.len() as u64);
}

#[test]
fn duplicate_is_reacked_but_not_redelivered() {
    let (peer, receiver_side) = memory::pair();
    let mut receiver = Receiver::with_channel(receiver_side, ChannelEmulator::ideal());

    let frame = packet::encode(0, b"payload");
    peer.send(&frame).unwrap();
    let first = receiver.poll_once().unwrap();
    assert_eq!(first.as_deref(), Some(&b"payload"[..]));
    match peer.recv_deadline(Duration::from_millis(100)).unwrap() {
        Polled::Datagram(ack) => assert_eq!(packet::decode_ack(&ack), Ok(0)),
        Polled::TimedOut => panic!("expected first ack"),
    }

    // The ACK "was lost": the sender retransmits the identical packet.
    peer.send(&frame).unwrap();
    let second = receiver.poll_once().unwrap();
    assert_eq!(second, None, "duplicate payload must not be redelivered");
    match peer.recv_deadline(Duration::from_millis(100)).unwrap() {
        Polled::Datagram(ack) => assert_eq!(packet::decode_ack(&ack), Ok(0)),
        Polled::TimedOut => panic!("expected repeated ack"),
    }
    assert_eq!(receiver.expected_seq(), 1);
}

#[test]
fn simulated_loss_triggers_retransmit() {
    let (sender_side, receiver_side) = memory::pair();

    let sender_thread = thread::spawn(move || {
        let mut sender = Sender::new(sender_side, fast_config());
        sender.send(b"bravo").expect("send failed")
    });

    let mut channel = ChannelEmulator::ideal();
    channel.force_drop_next();
    let mut receiver = Receiver::with_channel(receiver_side, channel);
    let delivered = collect_payloads(&mut receiver, 1);
    let outcome = sender_thread.join().expect("sender panicked");

    assert_eq!(delivered, vec![b"bravo".to_vec()]);
    assert_eq!(outcome.attempts, 2, "one loss means exactly one retransmit");
    assert_eq!(receiver.report().discarded, 1);
}

#[test]
fn simulated_corruption_triggers_retransmit() {
    let (sender_side, receiver_side) = memory::pair();

    let sender_thread = thread::spawn(move || {
        let mut sender = Sender::new(sender_side, fast_config());
        sender.send(b"charlie").expect("send failed")
    });

    let mut channel = ChannelEmulator::ideal();
    channel.force_corrupt_next();
    let mut receiver = Receiver::with_channel(receiver_side, channel);
    let delivered = collect_payloads(&mut receiver, 1);
    let outcome = sender_thread.join().expect("sender panicked");

    assert_eq!(delivered, vec![b"charlie".to_vec()]);
    assert_eq!(outcome.attempts, 2);
}

#[test]
fn retry_exhaustion_aborts_after_exact_budget() {
    let (sender_side, silent_peer) = memory::pair();
    let config = SessionConfig {
        max_retries: 3,
        initial_timeout_ms: 10,
        ..Default::default()
    };

    let sender_thread = thread::spawn(move || {
        let mut sender = Sender::new(sender_side, config);
        sender.send(b"doomed")
    });

    let result = sender_thread.join().expect("sender panicked");
    match result {
        Err(SessionError::RetryBudgetExhausted { attempts }) => assert_eq!(attempts, 4),
        other => panic!("expected retry exhaustion, got {other:?}"),
    }

    // 1 initial transmission + 3 retries reached the peer.
    let mut frames = 0;
    loop {
        match silent_peer.recv_deadline(Duration::from_millis(10)) {
            Ok(Polled::Datagram(_)) => frames += 1,
            Ok(Polled::TimedOut) | Err(_) => break,
        }
    }
    assert_eq!(frames, 4);
}

#[test]
fn stale_ack_does_not_restart_the_deadline() {
    let (sender_side, peer) = memory::pair();
    let config = SessionConfig {
        initial_timeout_ms: 100,
        ..Default::default()
    };

    let sender_thread = thread::spawn(move || {
        let mut sender = Sender::new(sender_side, config);
        sender.send(b"echo").expect("send failed")
    });

    // First transmission: answer with the wrong bit, then stay silent so
    // the original deadline must still fire.
    match peer.recv_deadline(Duration::from_secs(1)).unwrap() {
        Polled::Datagram(frame) => assert_eq!(frame[..4], [0, 0, 0, 0]),
        Polled::TimedOut => panic!("expected first transmission"),
    }
    peer.send(&packet::encode_ack(1)).unwrap();

    // Retransmission proves the stale ACK did not satisfy the sender.
    match peer.recv_deadline(Duration::from_secs(1)).unwrap() {
        Polled::Datagram(frame) => assert_eq!(frame[..4], [0, 0, 0, 0]),
        Polled::TimedOut => panic!("expected retransmission"),
    }
    peer.send(&packet::encode_ack(0)).unwrap();

    let outcome = sender_thread.join().expect("sender panicked");
    assert_eq!(outcome.attempts, 2);
}

#[test]
fn raised_shutdown_flag_stops_the_run_loop() {
    // Keep the peer endpoint alive so the only way out of the loop is the
    // cooperative flag, not a transport failure.
    let (_peer, receiver_side) = memory::pair();
    let stop = ShutdownFlag::new();

    let loop_flag = stop.clone();
    let handle = thread::spawn(move || {
        let mut receiver = Receiver::with_channel(receiver_side, ChannelEmulator::ideal());
        receiver.run(&loop_flag, |_| {})
    });

    // Let the loop settle into its bounded wait before interrupting it.
    thread::sleep(Duration::from_millis(50));
    let raised_at = Instant::now();
    stop.set();

    let report = handle
        .join()
        .expect("receiver panicked")
        .expect("shutdown must be a graceful outcome");
    // One bounded poll (250 ms) is the worst case before the flag is seen.
    assert!(raised_at.elapsed() < Duration::from_secs(1));
    assert_eq!(report.payloads, 0);
}

#[test]
fn malformed_datagram_is_silently_ignored() {
    let (peer, receiver_side) = memory::pair();
    let mut receiver = Receiver::with_channel(receiver_side, ChannelEmulator::ideal());

    peer.send(b"way too short").unwrap();
    assert_eq!(receiver.poll_once().unwrap(), None);
    match peer.recv_deadline(Duration::from_millis(50)).unwrap() {
        Polled::TimedOut => {}
        Polled::Datagram(_) => panic!("malformed input must not be acknowledged"),
    }
    assert_eq!(receiver.expected_seq(), 0);
}
