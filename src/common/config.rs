use crate::common::errors::{Result, TransferError};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024; // 4 KB
pub const ENV_PREFIX: &str = "FILEDROP_";

/// Receiver address, fixed for the lifetime of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // bracket bare IPv6 literals so the output parses back as host:port
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Config for a single-file transfer.
///
/// Layered as defaults, then a TOML file, then `FILEDROP_*` environment
/// variables (nested keys split on `__`, e.g. `FILEDROP_ENDPOINT__PORT`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub endpoint: Endpoint,
    pub chunk_size: usize,
    /// Flush the socket writer after every chunk instead of when its buffer fills
    pub flush_each_chunk: bool,
    pub connect_timeout_secs: u64,
    /// Wait for a one-byte receipt from the receiver after the body
    pub await_ack: bool,
    pub ack_timeout_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            flush_each_chunk: true,
            connect_timeout_secs: 10,
            await_ack: false,
            ack_timeout_secs: 30,
        }
    }
}

impl TransferConfig {
    /// Config with defaults pointed at `endpoint`, skipping file and env layers
    pub fn for_endpoint(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }

    /// Load layered configuration.
    ///
    /// An explicit `config_file` must exist. Without one, the platform config
    /// dir (`filedrop/config.toml`) is used when present.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(TransferConfig::default()));

        match config_file {
            Some(path) => {
                if !path.is_file() {
                    return Err(TransferError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = default_config_path() {
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        let config: TransferConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;

        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(TransferError::Config("chunk_size must be non-zero".to_string()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(TransferError::Config(
                "connect_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.ack_timeout_secs == 0 {
            return Err(TransferError::Config("ack_timeout_secs must be non-zero".to_string()));
        }
        if self.endpoint.host.trim().is_empty() {
            return Err(TransferError::Config("endpoint host is empty".to_string()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "filedrop").map(|dirs| dirs.config_dir().join("config.toml"))
}
