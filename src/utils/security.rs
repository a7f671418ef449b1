use std::path::{Component, Path};
use thiserror::Error;

/// Largest name the u16 length prefix can describe
pub const MAX_NAME_BYTES: usize = u16::MAX as usize;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Filename contains parent directory (..)")]
    ContainsParentDir,

    #[error("Filename contains null byte")]
    NullByte,

    #[error("Filename is empty")]
    Empty,

    #[error("Filename contains directory separator")]
    ContainsDirectorySeparator,

    #[error("Path has no file name component")]
    NoFileName,

    #[error("Filename is not valid UTF-8")]
    NotUtf8,

    #[error("Filename is {0} bytes, limit is 65535")]
    TooLong(usize),
}

/// Validate a name going into a frame header.
/// no: empty, null bytes, dir separators, `.`/`..`, more than 65535 bytes
pub fn validate_filename(filename: &str) -> Result<(), ValidationError> {
    if filename.is_empty() {
        return Err(ValidationError::Empty);
    }

    // rust uses C-style APIs so \0 can end str early on the receiver
    if filename.contains('\0') {
        return Err(ValidationError::NullByte);
    }

    // Backslash is rejected even on unix, the receiver may not be
    if filename.contains('/') || filename.contains('\\') {
        return Err(ValidationError::ContainsDirectorySeparator);
    }

    match Path::new(filename).components().next() {
        Some(Component::Normal(_)) => {}
        Some(Component::ParentDir) => return Err(ValidationError::ContainsParentDir),
        _ => return Err(ValidationError::NoFileName),
    }

    if filename.len() > MAX_NAME_BYTES {
        return Err(ValidationError::TooLong(filename.len()));
    }

    Ok(())
}

/// Base name of `path` as it goes on the wire
pub fn frame_name(path: &Path) -> Result<String, ValidationError> {
    let name = path
        .file_name()
        .ok_or(ValidationError::NoFileName)?
        .to_str()
        .ok_or(ValidationError::NotUtf8)?;

    validate_filename(name)?;
    Ok(name.to_string())
}
