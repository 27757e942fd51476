//! The abstract datagram channel the state machines run over.
//!
//! The protocol core needs exactly two primitives from its transport:
//! fire-and-forget send, and a blocking receive that distinguishes
//! "deadline expired" from "datagram arrived" from "transport broke".
//! [`UdpTransport`] provides the real thing; [`memory::pair`] provides an
//! in-process channel so both endpoints can run on threads in tests.

use std::cell::Cell;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Largest datagram we will accept from the wire.
const MAX_DATAGRAM: usize = 65536;

/// Result of one bounded receive.
#[derive(Debug)]
pub enum Polled {
    Datagram(Vec<u8>),
    TimedOut,
}

pub trait Transport {
    fn send(&self, buf: &[u8]) -> io::Result<()>;

    /// Block for at most `deadline` waiting for one datagram.
    ///
    /// Deadline expiry is reported as `Ok(Polled::TimedOut)`; an `Err` is
    /// a genuine transport failure.
    fn recv_deadline(&self, deadline: Duration) -> io::Result<Polled>;
}

/// UDP-backed transport for one peer.
///
/// The sender side connects to a known peer address. The receiver side
/// binds and learns its peer from the first datagram; the peer stays
/// fixed for the rest of the session.
pub struct UdpTransport {
    socket: UdpSocket,
    peer: Cell<Option<SocketAddr>>,
}

impl UdpTransport {
    /// Sender-side constructor: bind an ephemeral local port and fix the peer.
    pub fn connect(peer: impl ToSocketAddrs) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        let peer_addr = resolve(peer)?;
        Ok(Self {
            socket,
            peer: Cell::new(Some(peer_addr)),
        })
    }

    /// Receiver-side constructor: bind the listen address, peer unknown
    /// until the first datagram arrives.
    pub fn bind(listen: impl ToSocketAddrs) -> io::Result<Self> {
        let socket = UdpSocket::bind(listen)?;
        Ok(Self {
            socket,
            peer: Cell::new(None),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

fn resolve(addr: impl ToSocketAddrs) -> io::Result<SocketAddr> {
    addr.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing")
    })
}

impl Transport for UdpTransport {
    fn send(&self, buf: &[u8]) -> io::Result<()> {
        let peer = self.peer.get().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "no peer has spoken yet")
        })?;
        self.socket.send_to(buf, peer)?;
        Ok(())
    }

    fn recv_deadline(&self, deadline: Duration) -> io::Result<Polled> {
        if deadline.is_zero() {
            return Ok(Polled::TimedOut);
        }
        self.socket.set_read_timeout(Some(deadline))?;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        match self.socket.recv_from(&mut buf) {
            Ok((len, from)) => {
                // The session has exactly one peer: learn it from the first
                // datagram, then ignore where later ones claim to come from
                // so a stray third party cannot redirect replies.
                if self.peer.get().is_none() {
                    self.peer.set(Some(from));
                }
                buf.truncate(len);
                Ok(Polled::Datagram(buf))
            }
            Err(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(Polled::TimedOut)
            }
            Err(err) => Err(err),
        }
    }
}

/// In-process paired transport for tests and demos.
pub mod memory {
    use super::{Polled, Transport};
    use std::io;
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
    use std::sync::Mutex;
    use std::time::Duration;

    pub struct MemoryTransport {
        tx: Sender<Vec<u8>>,
        rx: Mutex<Receiver<Vec<u8>>>,
    }

    /// Two cross-wired endpoints: whatever one sends, the other receives.
    pub fn pair() -> (MemoryTransport, MemoryTransport) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (
            MemoryTransport {
                tx: a_tx,
                rx: Mutex::new(a_rx),
            },
            MemoryTransport {
                tx: b_tx,
                rx: Mutex::new(b_rx),
            },
        )
    }

    impl Transport for MemoryTransport {
        fn send(&self, buf: &[u8]) -> io::Result<()> {
            self.tx
                .send(buf.to_vec())
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer endpoint dropped"))
        }

        fn recv_deadline(&self, deadline: Duration) -> io::Result<Polled> {
            let rx = self
                .rx
                .lock()
                .map_err(|_| io::Error::other("transport lock poisoned"))?;
            match rx.recv_timeout(deadline) {
                Ok(datagram) => Ok(Polled::Datagram(datagram)),
                Err(RecvTimeoutError::Timeout) => Ok(Polled::TimedOut),
                Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "peer endpoint dropped",
                )),
            }
        }
    }
}
