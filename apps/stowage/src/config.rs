//! Server configuration.
//!
//! Stored as TOML with three sections (`[server]`, `[storage]`,
//! `[upload]`). Missing keys fall back to their defaults; a missing file
//! is created with every default written out.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use stowage_protocol::constants::{
    HANDSHAKE_TIMEOUT, MULTIPART_THRESHOLD, UPLOAD_PATH, WS_MAX_MESSAGE_SIZE,
};
use stowage_server::ServerConfig;
use stowage_storage::DEFAULT_MIN_PART_SIZE;
use stowage_upload::{
    DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_INFLIGHT_PARTS, DEFAULT_RETRIES, DEFAULT_RETRY_BACKOFF,
    RetryPolicy, UploadConfig,
};

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub upload: UploadSection,
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// WebSocket route.
    #[serde(default = "default_path")]
    pub path: String,

    /// Base of the download links stored in file records.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,

    /// Largest accepted chunk frame in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Object store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_root")]
    pub root: PathBuf,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Smallest accepted non-final multipart part.
    #[serde(default = "default_min_part_size")]
    pub min_part_size: u64,
}

/// Transfer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSection {
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold: u64,

    /// Extra attempts after a failed part upload.
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    #[serde(default = "default_max_inflight_parts")]
    pub max_inflight_parts: usize,

    /// Seconds to wait for the next client frame (0 = forever).
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

fn default_path() -> String {
    UPLOAD_PATH.into()
}

fn default_public_url() -> String {
    format!("http://localhost:{}", default_port())
}

fn default_handshake_timeout_secs() -> u64 {
    HANDSHAKE_TIMEOUT.as_secs()
}

fn default_max_message_size() -> usize {
    WS_MAX_MESSAGE_SIZE
}

fn default_root() -> PathBuf {
    PathBuf::from("./data")
}

fn default_bucket() -> String {
    "uploads".into()
}

fn default_min_part_size() -> u64 {
    DEFAULT_MIN_PART_SIZE
}

fn default_multipart_threshold() -> u64 {
    MULTIPART_THRESHOLD
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_retry_backoff_secs() -> u64 {
    DEFAULT_RETRY_BACKOFF.as_secs()
}

fn default_max_inflight_parts() -> usize {
    DEFAULT_MAX_INFLIGHT_PARTS
}

fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT.as_secs()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            path: default_path(),
            public_url: default_public_url(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            bucket: default_bucket(),
            min_part_size: default_min_part_size(),
        }
    }
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            multipart_threshold: default_multipart_threshold(),
            retries: default_retries(),
            retry_backoff_secs: default_retry_backoff_secs(),
            max_inflight_parts: default_max_inflight_parts(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or writes the defaults there if
    /// the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config: Config =
                toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Writes the configuration to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.server.path.starts_with('/') {
            bail!("server.path must start with '/': {}", self.server.path);
        }
        if self.server.public_url.is_empty() {
            bail!("server.public_url must not be empty");
        }
        if self.storage.bucket.is_empty() {
            bail!("storage.bucket must not be empty");
        }
        if self.upload.multipart_threshold == 0 {
            bail!("upload.multipart_threshold must be positive");
        }
        if self.upload.max_inflight_parts == 0 {
            bail!("upload.max_inflight_parts must be at least 1");
        }
        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind: self.server.bind,
            port: self.server.port,
            path: self.server.path.clone(),
            handshake_timeout: Duration::from_secs(self.server.handshake_timeout_secs),
            max_message_size: self.server.max_message_size,
        }
    }

    pub fn upload_config(&self) -> UploadConfig {
        let idle_timeout = match self.upload.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        UploadConfig {
            multipart_threshold: self.upload.multipart_threshold,
            retry: RetryPolicy {
                retries: self.upload.retries,
                backoff: Duration::from_secs(self.upload.retry_backoff_secs),
            },
            max_inflight_parts: self.upload.max_inflight_parts,
            idle_timeout,
            public_url: self.server.public_url.clone(),
        }
    }
}
