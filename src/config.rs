//! Configuration management for StakeChain

use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub entropy: EntropyConfig,
    #[serde(default)]
    pub codec: CodecConfig,
}

/// Block production policy.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ConsensusConfig {
    #[serde(default)]
    pub allow_empty_blocks: bool,
}

/// Retry policy for the OS entropy source used by proposer selection.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EntropyConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl EntropyConfig {
    /// Delay before retry number `attempt` (0-based), doubling up to the cap.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CodecConfig {
    /// Upper bound on an encoded block or transaction accepted by the decoder.
    #[serde(default = "default_max_blob_size")]
    pub max_blob_size: u64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_blob_size: default_max_blob_size(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.entropy.max_backoff_ms < self.entropy.initial_backoff_ms {
            return Err(ChainError::Config(
                "entropy.max_backoff_ms must be >= entropy.initial_backoff_ms".to_string(),
            ));
        }
        if self.codec.max_blob_size == 0 {
            return Err(ChainError::Config(
                "codec.max_blob_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads configuration from a TOML file; a missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(contents) => Config::from_toml_str(&contents),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    10
}

fn default_max_backoff_ms() -> u64 {
    1_000
}

fn default_max_blob_size() -> u64 {
    8 * 1024 * 1024
}
