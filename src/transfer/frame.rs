//! Wire codec for the upload frame.
//!
//! ```text
//! +-------------+-------------+-------------+----------------+
//! | name_len    | name        | size        | body           |
//! | u16 BE      | UTF-8       | u64 BE      | `size` bytes   |
//! +-------------+-------------+-------------+----------------+
//! ```
//!
//! When acknowledgments are enabled the receiver answers with a single
//! status byte after reading the full body.

use crate::common::errors::ProtocolError;
use crate::utils::security::{validate_filename, ValidationError};
use bytes::{BufMut, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const ACK_ACCEPTED: u8 = 0x01;
pub const ACK_REJECTED: u8 = 0x00;

/// Name and size preceding the body of a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub name: String,
    pub size: u64,
}

impl FrameHeader {
    pub fn new(name: impl Into<String>, size: u64) -> Result<Self, ProtocolError> {
        let name = name.into();
        validate_filename(&name)?;
        Ok(Self { name, size })
    }

    /// Bytes this header occupies on the wire
    pub fn encoded_len(&self) -> usize {
        2 + self.name.len() + 8
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        // length fits: enforced by validate_filename
        buf.put_u16(self.name.len() as u16);
        buf.put_slice(self.name.as_bytes());
        buf.put_u64(self.size);
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        writer.write_all(&buf).await
    }

    /// Read one header.
    ///
    /// Returns `Ok(None)` when the peer closed the connection before sending
    /// any header byte, so a zero-length file (`size == 0`) stays distinct
    /// from an empty connection. EOF inside the header is `UnexpectedEof`.
    pub async fn read_from<R>(reader: &mut R) -> io::Result<Option<Self>>
    where
        R: AsyncRead + Unpin,
    {
        let mut len_buf = [0u8; 2];
        let first = reader.read(&mut len_buf).await?;
        if first == 0 {
            return Ok(None);
        }
        if first == 1 {
            reader.read_exact(&mut len_buf[1..]).await?;
        }
        let name_len = u16::from_be_bytes(len_buf) as usize;

        let mut name = vec![0u8; name_len];
        reader.read_exact(&mut name).await?;
        let name = String::from_utf8(name)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let size = reader.read_u64().await?;
        Ok(Some(Self { name, size }))
    }
}

/// Read the receiver's status byte
pub async fn read_ack<R>(reader: &mut R) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut status = [0u8; 1];
    match reader.read(&mut status).await {
        Ok(0) => Err(ProtocolError::MissingAck),
        Err(e) => Err(ProtocolError::AckRead(e)),
        Ok(_) => match status[0] {
            ACK_ACCEPTED => Ok(()),
            ACK_REJECTED => Err(ProtocolError::Rejected),
            other => Err(ProtocolError::UnexpectedAck(other)),
        },
    }
}

impl From<ValidationError> for ProtocolError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::TooLong(len) => ProtocolError::NameTooLong(len),
            other => ProtocolError::InvalidName(other.to_string()),
        }
    }
}
