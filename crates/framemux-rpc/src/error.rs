use std::time::Duration;

use framemux_conn::ConnError;

/// Errors surfaced to RPC callers.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Connection or stream failure.
    #[error("connection error: {0}")]
    Conn(#[from] ConnError),

    /// The peer answered with a non-2xx status.
    #[error("status {status}: {message}")]
    Status { status: u16, message: String },

    /// No response arrived before the configured deadline.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The operation path is not `namespace/operation` or
    /// `namespace/id/operation`.
    #[error("invalid operation path: {0:?}")]
    InvalidPath(String),
}

impl RpcError {
    /// Status code carried by the error, if the peer produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;

/// Failure returned by application handlers; reported to the caller as a
/// 500 carrying the error's message.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
