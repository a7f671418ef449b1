//! Length-prefixed single-file upload client.
//!
//! One [`TransferSession`] owns one TCP connection and sends one frame:
//! a u16 length-prefixed UTF-8 name, a u64 big-endian size, then the body.

pub mod common;
pub mod logging;
pub mod transfer;
mod transport;
pub mod utils;

pub use common::{Endpoint, ErrorKind, ProtocolError, TransferConfig, TransferError};
pub use transfer::{send_with_retry, Ack, FrameHeader, RetryPolicy, SessionState, TransferSession};
