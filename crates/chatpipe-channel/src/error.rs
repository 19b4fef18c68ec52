use chatpipe_transport::TransportError;

use crate::state::InvalidTransition;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// A remote call failed. The whole `send`/`receive` call is void.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Size settings leave no room for an inline chunk.
    #[error("size violation: {0}")]
    SizeViolation(String),

    /// Settings that would make the channel talk to itself.
    #[error("misconfigured channel: {0}")]
    Misconfigured(String),

    /// A post was driven out of protocol order. Indicates a bug.
    #[error(transparent)]
    Protocol(#[from] InvalidTransition),
}
