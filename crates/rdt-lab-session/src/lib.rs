pub mod error;
pub mod receiver;
pub mod report;
pub mod sender;
pub mod shutdown;
pub mod transport;

pub use error::SessionError;
pub use receiver::Receiver;
pub use report::SessionReport;
pub use sender::{SendOutcome, Sender};
pub use shutdown::ShutdownFlag;
pub use transport::{Polled, Transport, UdpTransport};
