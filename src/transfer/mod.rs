pub mod frame;
mod io;
pub mod retry;
mod session;

pub use frame::FrameHeader;
pub use retry::{send_with_retry, RetryPolicy};
pub use session::{Ack, SessionState, TransferSession};
