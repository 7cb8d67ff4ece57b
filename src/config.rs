use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::constants::{
    DEFAULT_CHAT_SAMPLE, DEFAULT_CHUNK_SIZE, DEFAULT_MIN_LEN, DEFAULT_MIN_PREVIEW_LEN,
    DEFAULT_OVERLAP, DEFAULT_PREVIEW_LEN, DEFAULT_TOP_DOMAINS,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,
    #[error("overlap {overlap} must be smaller than chunk_size {chunk_size}")]
    OverlapTooLarge { overlap: u64, chunk_size: u64 },
    #[error("min_len must be at least 1")]
    ZeroMinLen,
}

/// Carver tunables. Passed by reference into the scan entry points and never
/// mutated while a scan is running.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    pub chunk_size: u64,
    #[serde(rename = "overlap_bytes")]
    pub overlap: u64,
    pub min_len: usize,
    pub scan_utf16: bool,
    /// Emit `kind=string` rows for candidates that match no artifact rule.
    pub emit_strings: bool,
    pub preview_len: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            min_len: DEFAULT_MIN_LEN,
            scan_utf16: true,
            emit_strings: true,
            preview_len: DEFAULT_PREVIEW_LEN,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge {
                overlap: self.overlap,
                chunk_size: self.chunk_size,
            });
        }
        if self.min_len == 0 {
            return Err(ConfigError::ZeroMinLen);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ReduceConfig {
    /// Rows without message or value whose preview is shorter than this are dropped.
    pub min_preview_len: usize,
    pub top_domains: usize,
    pub chat_sample: usize,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            min_preview_len: DEFAULT_MIN_PREVIEW_LEN,
            top_domains: DEFAULT_TOP_DOMAINS,
            chat_sample: DEFAULT_CHAT_SAMPLE,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub run_id: String,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub progress_interval_secs: u64,
    #[serde(default)]
    pub reduce: ReduceConfig,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub config_hash: String,
}

pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let bytes: Vec<u8> = if let Some(p) = path {
        std::fs::read(p).with_context(|| format!("reading config {}", p.display()))?
    } else {
        include_bytes!("../config/default.yml").to_vec()
    };

    let mut config: Config = serde_yaml::from_slice(&bytes).context("parsing config yaml")?;
    if config.run_id.trim().is_empty() {
        config.run_id = generate_run_id();
    }
    config.scan.validate()?;

    let config_hash = hash_bytes(&bytes);

    Ok(LoadedConfig { config, config_hash })
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn generate_run_id() -> String {
    let now = chrono::Utc::now();
    format!("{}_{:08x}", now.format("%Y%m%dT%H%M%SZ"), now.timestamp_subsec_nanos())
}
