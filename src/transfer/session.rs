use crate::common::config::{Endpoint, TransferConfig};
use crate::common::errors::{ProtocolError, Result, TransferError};
use crate::transfer::frame::{self, FrameHeader};
use crate::transfer::io::stream_body;
use crate::transport;
use crate::utils::security::frame_name;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Lifecycle of a [`TransferSession`].
///
/// ```text
/// Idle --connect--> Connected --send--> Sending --done--> Closed
///   \                   \                  \
///    `------------------`------------------`--error--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
    Sending,
    Closed,
    Failed,
}

impl SessionState {
    /// Closed and Failed sessions are finished and must be discarded
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

/// Result of a completed send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub name: String,
    pub bytes_sent: u64,
    /// SHA-256 of the body as it was streamed
    pub sha256: String,
    /// Receiver answered with an accept byte (only when acks are enabled)
    pub confirmed: bool,
}

/// One connection, one file.
///
/// Owns its socket exclusively; nothing is shared between sessions.
pub struct TransferSession {
    id: Uuid,
    config: TransferConfig,
    state: SessionState,
    stream: Option<TcpStream>,
}

impl TransferSession {
    /// Build an idle session; nothing touches the network until [`connect`].
    ///
    /// [`connect`]: TransferSession::connect
    pub fn new(config: TransferConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            state: SessionState::Idle,
            stream: None,
        }
    }

    /// Connect to the configured endpoint
    pub async fn open(config: TransferConfig) -> Result<Self> {
        let mut session = Self::new(config);
        session.connect().await?;
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.config.endpoint
    }

    pub async fn connect(&mut self) -> Result<()> {
        self.require(SessionState::Idle, "connect")?;

        let endpoint = &self.config.endpoint;
        match transport::connect(endpoint, self.config.connect_timeout()).await {
            Ok(stream) => {
                tracing::debug!(session_id = %self.id, %endpoint, "connected");
                self.stream = Some(stream);
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(e) => {
                tracing::debug!(session_id = %self.id, %endpoint, error = %e, "connect failed");
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    /// Send the file at `path` as one frame.
    ///
    /// On success the connection is shut down and the session is Closed. Any
    /// error leaves it Failed; the caller opens a new session to try again.
    pub async fn send(&mut self, path: impl AsRef<Path>, cancel: &CancellationToken) -> Result<Ack> {
        let path = path.as_ref();
        self.require(SessionState::Connected, "send")?;

        let span = tracing::info_span!(
            "send",
            session_id = %self.id,
            endpoint = %self.config.endpoint,
            path = %path.display()
        );

        self.state = SessionState::Sending;
        let result = self.send_frame(path, cancel).instrument(span).await;

        // Socket is released on every exit path
        self.stream = None;
        match &result {
            Ok(ack) => {
                self.state = SessionState::Closed;
                tracing::info!(
                    session_id = %self.id,
                    name = %ack.name,
                    bytes = ack.bytes_sent,
                    sha256 = %ack.sha256,
                    confirmed = ack.confirmed,
                    "file sent"
                );
            }
            Err(e) => {
                self.state = SessionState::Failed;
                tracing::debug!(session_id = %self.id, error = %e, "send failed");
            }
        }
        result
    }

    async fn send_frame(&mut self, path: &Path, cancel: &CancellationToken) -> Result<Ack> {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let name = frame_name(path).map_err(ProtocolError::from)?;

        // Size comes from the same handle the body is read from
        let mut file = File::open(path).await.map_err(|source| file_error(path, source))?;
        let metadata = file.metadata().await.map_err(|source| file_error(path, source))?;
        if metadata.is_dir() {
            return Err(file_error(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "is a directory"),
            ));
        }
        let header = FrameHeader::new(name, metadata.len())?;

        let stream = self
            .stream
            .as_mut()
            .ok_or(TransferError::InvalidState {
                state: SessionState::Sending,
                operation: "send",
            })?;

        tracing::debug!(name = %header.name, size = header.size, "writing header");
        let capacity = self.config.chunk_size.max(header.encoded_len());
        let mut writer = BufWriter::with_capacity(capacity, &mut *stream);
        header.write_to(&mut writer).await?;

        let body = stream_body(
            &mut file,
            path,
            &mut writer,
            header.size,
            self.config.chunk_size,
            self.config.flush_each_chunk,
            cancel,
        )
        .await?;
        drop(writer);
        drop(file);

        // FIN tells the receiver the frame is complete
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            shutdown = stream.shutdown() => shutdown?,
        }

        let confirmed = if self.config.await_ack {
            let timeout = self.config.ack_timeout();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                ack = transport::with_timeout(timeout, frame::read_ack(&mut *stream)) => {
                    ack.map_err(|_| ProtocolError::AckTimeout(timeout))??;
                }
            }
            true
        } else {
            false
        };

        Ok(Ack {
            name: header.name,
            bytes_sent: body.bytes,
            sha256: body.sha256,
            confirmed,
        })
    }

    /// Release the connection. Safe to call any number of times.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!(session_id = %self.id, error = %e, "shutdown on close failed");
            }
            tracing::debug!(session_id = %self.id, "closed");
        }

        if self.state != SessionState::Failed {
            self.state = SessionState::Closed;
        }
    }

    fn require(&self, expected: SessionState, operation: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(TransferError::InvalidState {
                state: self.state,
                operation,
            });
        }
        Ok(())
    }
}

fn file_error(path: &Path, source: std::io::Error) -> TransferError {
    TransferError::File {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, TransferConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, TransferConfig::for_endpoint(Endpoint::new("127.0.0.1", port)))
    }

    #[tokio::test]
    async fn new_session_is_idle() {
        let session = TransferSession::new(TransferConfig::default());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.endpoint(), &Endpoint::default());
    }

    #[tokio::test]
    async fn connect_then_close_without_sending() {
        let (listener, config) = listener().await;
        let accept = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let mut session = TransferSession::open(config).await.unwrap();
        assert_eq!(session.state(), SessionState::Connected);

        session.close().await;
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);

        // nothing was framed
        assert!(accept.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn connect_twice_is_invalid() {
        let (_listener, config) = listener().await;
        let mut session = TransferSession::open(config).await.unwrap();

        let err = session.connect().await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::InvalidState {
                state: SessionState::Connected,
                operation: "connect"
            }
        ));
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn send_before_connect_is_invalid() {
        let mut session = TransferSession::new(TransferConfig::default());
        let err = session
            .send("/etc/hostname", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::InvalidState { .. }));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn missing_file_fails_session() {
        let (_listener, config) = listener().await;
        let mut session = TransferSession::open(config).await.unwrap();

        let err = session
            .send("/no/such/dir/file.bin", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::File { .. }));
        assert_eq!(session.state(), SessionState::Failed);

        // failed session stays failed after close
        session.close().await;
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn directory_is_rejected() {
        let (_listener, config) = listener().await;
        let dir = tempfile::TempDir::new().unwrap();
        let mut session = TransferSession::open(config).await.unwrap();

        let err = session
            .send(dir.path(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::File { .. }));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn terminal_states() {
        assert!(SessionState::Closed.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Connected.is_terminal());
        assert!(!SessionState::Sending.is_terminal());
    }
}
