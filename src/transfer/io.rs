use crate::common::errors::{Result, TransferError};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// What actually went over the wire for a body
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BodyStats {
    pub bytes: u64,
    pub sha256: String,
}

/// Copy exactly `size` bytes from `source` to `sink` in `chunk_size` pieces.
///
/// Reading stops at `size` even if the file has grown since the header was
/// written. A file that ends early yields `FileChanged`.
pub(crate) async fn stream_body<R, W>(
    source: &mut R,
    source_path: &Path,
    sink: &mut W,
    size: u64,
    chunk_size: usize,
    flush_each_chunk: bool,
    cancel: &CancellationToken,
) -> Result<BodyStats>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut limited = source.take(size);
    let mut buffer = vec![0u8; chunk_size];
    let mut hasher = Sha256::new();
    let mut sent: u64 = 0;

    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            read = limited.read(&mut buffer) => read,
        };
        let n = read.map_err(|source| TransferError::File {
            path: source_path.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }

        let write_start = std::time::Instant::now();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            written = write_chunk(sink, &buffer[..n], flush_each_chunk) => written?,
        }
        tracing::trace!(
            offset = sent,
            bytes = n,
            elapsed_us = write_start.elapsed().as_micros() as u64,
            "chunk_write"
        );

        hasher.update(&buffer[..n]);
        sent += n as u64;
    }

    if sent != size {
        return Err(TransferError::FileChanged {
            expected: size,
            actual: sent,
        });
    }

    sink.flush().await?;

    Ok(BodyStats {
        bytes: sent,
        sha256: hex::encode(hasher.finalize()),
    })
}

// write_all retries partial writes until the chunk is fully handed off
async fn write_chunk<W>(sink: &mut W, chunk: &[u8], flush: bool) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    sink.write_all(chunk).await?;
    if flush {
        sink.flush().await?;
    }
    Ok(())
}
