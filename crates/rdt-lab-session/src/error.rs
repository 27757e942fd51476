use thiserror::Error;

/// Fatal session outcomes. Transient conditions (deadline expiry,
/// undecodable datagrams, stale sequence bits, simulated loss or
/// corruption) are handled inside the state machines and never surface
/// here.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The sender gave up on the in-flight packet. Distinct from a
    /// graceful shutdown; the payload was never acknowledged.
    #[error("retry budget exhausted after {attempts} transmissions")]
    RetryBudgetExhausted { attempts: u32 },

    /// Any transport failure other than deadline expiry.
    #[error("transport failure")]
    Transport(#[from] std::io::Error),
}
