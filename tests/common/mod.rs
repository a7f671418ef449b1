#![allow(dead_code)]

use filedrop::{Endpoint, FrameHeader, TransferConfig};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Everything a test receiver saw on one connection
#[derive(Debug)]
pub struct Received {
    pub header: Option<FrameHeader>,
    pub body: Vec<u8>,
    /// Bytes after the declared body, should always be empty
    pub trailing: Vec<u8>,
}

pub fn setup_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("Failed to write fixture");
    path
}

/// Deterministic non-repeating-ish content
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

pub fn config_for(port: u16) -> TransferConfig {
    TransferConfig::for_endpoint(Endpoint::new("127.0.0.1", port))
}

/// Port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub async fn read_frame(socket: &mut TcpStream) -> Received {
    let header = FrameHeader::read_from(socket).await.expect("header read");

    let mut body = Vec::new();
    if let Some(header) = &header {
        (&mut *socket)
            .take(header.size)
            .read_to_end(&mut body)
            .await
            .expect("body read");
    }

    Received {
        header,
        body,
        trailing: Vec::new(),
    }
}

/// Accept one connection, decode one frame, optionally answer with `ack`.
pub async fn spawn_receiver(ack: Option<u8>) -> (TransferConfig, JoinHandle<Received>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = read_frame(&mut socket).await;

        match ack {
            Some(status) => socket.write_all(&[status]).await.unwrap(),
            None => {
                socket.read_to_end(&mut received.trailing).await.unwrap();
            }
        }
        received
    });

    (config_for(port), handle)
}

/// Accept connections forever. Connection `n` is answered with `answers[n]`
/// (the last entry repeats); `None` hangs up without an acknowledgment.
pub async fn spawn_counting_receiver(answers: Vec<Option<u8>>) -> (TransferConfig, Arc<AtomicUsize>) {
    assert!(!answers.is_empty(), "receiver needs at least one answer");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let index = seen.fetch_add(1, Ordering::SeqCst);
            read_frame(&mut socket).await;

            let answer = answers.get(index).or(answers.last()).copied().flatten();
            if let Some(status) = answer {
                let _ = socket.write_all(&[status]).await;
            }
        }
    });

    (config_for(port), count)
}

/// Accept one connection, read its frame, then keep the socket open without
/// answering until the returned sender fires or is dropped.
pub async fn spawn_silent_receiver() -> (TransferConfig, tokio::sync::oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_frame(&mut socket).await;
        let _ = release_rx.await;
    });

    (config_for(port), release_tx)
}
