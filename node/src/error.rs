//! Typed errors for transport, decoding, and node startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),
    #[error("io failed: {0}")]
    Io(#[source] std::io::Error),
    #[error("request timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("buffer too short")]
    Truncated,
    #[error("unknown message tag {0:#04x}")]
    UnknownTag(u8),
    #[error("invalid utf8 in string field")]
    InvalidUtf8,
}

impl From<std::io::Error> for DecodeError {
    fn from(_: std::io::Error) -> Self {
        DecodeError::Truncated
    }
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("request denied by security policy")]
    Denied,
    #[error("failed to bind listening socket: {0}")]
    BindFailed(#[source] std::io::Error),
    #[error("initial lookup against seed node failed")]
    JoinLookupFailed,
}
