use crate::common::config::Endpoint;
use crate::common::errors::{Result, TransferError};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;

/// Open a TCP connection to `endpoint`, giving up after `timeout`.
///
/// Name resolution counts against the same timeout.
pub(crate) async fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<TcpStream> {
    let attempt = TcpStream::connect((endpoint.host.as_str(), endpoint.port));

    let stream = with_timeout(timeout, attempt)
        .await
        .map_err(|_| TransferError::ConnectTimeout {
            endpoint: endpoint.clone(),
            timeout,
        })?
        .map_err(|source| TransferError::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;

    // Chunks are flushed explicitly, don't let Nagle hold them back
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "set_nodelay failed");
    }

    Ok(stream)
}

pub(crate) async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, tokio::time::error::Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future).await
}
