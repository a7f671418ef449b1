use crate::common::config::Endpoint;
use crate::transfer::SessionState;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Broad failure class of a transfer, used by callers deciding what to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connect,
    Io,
    Protocol,
    Other,
}

/// Frame-level violations, raised either before a header is written or while
/// reading the optional acknowledgment.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("file name is {0} bytes, frame limit is 65535")]
    NameTooLong(usize),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("receiver rejected the frame")]
    Rejected,

    #[error("connection closed before acknowledgment")]
    MissingAck,

    #[error("failed to read acknowledgment: {0}")]
    AckRead(#[source] std::io::Error),

    #[error("unexpected acknowledgment byte {0:#04x}")]
    UnexpectedAck(u8),

    #[error("acknowledgment not received within {0:?}")]
    AckTimeout(Duration),
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },

    #[error("connecting to {endpoint} timed out after {timeout:?}")]
    ConnectTimeout {
        endpoint: Endpoint,
        timeout: Duration,
    },

    #[error("cannot read {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Header promised `expected` bytes but the file ended after `actual`
    #[error("file changed during transfer: expected {expected} bytes, read {actual}")]
    FileChanged { expected: u64, actual: u64 },

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transfer cancelled")]
    Cancelled,

    #[error("cannot {operation} a session in state {state:?}")]
    InvalidState {
        state: SessionState,
        operation: &'static str,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::Connect { .. } | TransferError::ConnectTimeout { .. } => {
                ErrorKind::Connect
            }
            TransferError::File { .. } | TransferError::FileChanged { .. } | TransferError::Io(_) => {
                ErrorKind::Io
            }
            TransferError::Protocol(_) => ErrorKind::Protocol,
            TransferError::Cancelled
            | TransferError::InvalidState { .. }
            | TransferError::Config(_) => ErrorKind::Other,
        }
    }

    /// Whether a fresh session has a chance of succeeding where this one failed.
    ///
    /// Local file problems are not retryable, a missing file stays missing.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::Connect { .. }
            | TransferError::ConnectTimeout { .. }
            | TransferError::FileChanged { .. }
            | TransferError::Io(_) => true,
            TransferError::Protocol(ProtocolError::MissingAck)
            | TransferError::Protocol(ProtocolError::AckRead(_))
            | TransferError::Protocol(ProtocolError::AckTimeout(_)) => true,
            _ => false,
        }
    }
}

impl From<figment::Error> for TransferError {
    fn from(err: figment::Error) -> Self {
        TransferError::Config(err.to_string())
    }
}

pub type Result<T, E = TransferError> = std::result::Result<T, E>;
