pub mod config;
pub mod errors;

pub use config::{Endpoint, TransferConfig};
pub use errors::{ErrorKind, ProtocolError, Result, TransferError};
