pub mod security;

pub use security::{frame_name, validate_filename, ValidationError};
