//! Configuration system for matinee.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $MATINEE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/matinee/config.toml
//!   3. ~/.config/matinee/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatineeConfig {
    pub session: SessionConfig,
    pub stream: StreamConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Peer id to dial on startup, supplied out-of-band via a shared
    /// locator. Empty = start a new party and wait for joiners.
    pub seed_peer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Bytes per locally-produced chunk.
    pub chunk_size: usize,
    /// Producer lookahead: suspend file reads while this many chunks
    /// are queued and undelivered.
    pub queue_window: usize,
    /// Delay before re-polling a sink that reports a write in progress.
    pub busy_retry_ms: u64,
    /// Backoff before re-attempting a chunk the sink rejected.
    pub reject_backoff_ms: u64,
    /// Delay before the suspended producer re-checks the queue depth.
    pub producer_poll_ms: u64,
    /// Poll interval for the end-of-stream watcher.
    pub eos_poll_ms: u64,
    /// Seconds of already-played media retained in the sink before
    /// older data is evicted.
    pub retention_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Fallback playback source used by the embedder when the sink
    /// reports the stream format unsupported. Empty = no fallback.
    pub fallback_source: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for MatineeConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            stream: StreamConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed_peer: String::new(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256 * 1024,
            queue_window: 10,
            busy_retry_ms: 50,
            reject_backoff_ms: 100,
            producer_poll_ms: 1000,
            eos_poll_ms: 100,
            retention_secs: 60.0,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            fallback_source: String::new(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("matinee")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl MatineeConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            MatineeConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("MATINEE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&MatineeConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply MATINEE_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MATINEE_SESSION__SEED_PEER") {
            self.session.seed_peer = v;
        }
        if let Ok(v) = std::env::var("MATINEE_STREAM__CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                self.stream.chunk_size = n;
            }
        }
        if let Ok(v) = std::env::var("MATINEE_STREAM__QUEUE_WINDOW") {
            if let Ok(n) = v.parse() {
                self.stream.queue_window = n;
            }
        }
        if let Ok(v) = std::env::var("MATINEE_STREAM__RETENTION_SECS") {
            if let Ok(n) = v.parse() {
                self.stream.retention_secs = n;
            }
        }
        if let Ok(v) = std::env::var("MATINEE_MEDIA__FALLBACK_SOURCE") {
            self.media.fallback_source = v;
        }
    }
}
