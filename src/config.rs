//! Configuration loading.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. Built-in defaults.
//! 2. An optional TOML file (`--config`, default `./config/docchat.toml`).
//! 3. Environment variables (`BACKEND_URL`, `POD_ID`, `BUCKET_NAME`,
//!    `S3_ENDPOINT`, `AWS_REGION`), optionally loaded from a `.env` file.
//!
//! ```toml
//! [backend]
//! pod_id = "i1q8dnudt5raii"
//! # url = "http://localhost:8000"   # overrides pod_id/port
//! chat_timeout_secs = 300
//!
//! [storage]
//! bucket = "rag-teste-bnu"
//! region = "us-east-1"
//! # endpoint_url = "http://localhost:9000"   # MinIO
//! ```
//!
//! AWS credentials are not part of [`Config`]; see
//! [`crate::storage::AwsCredentials`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackendConfig {
    /// Full base URL. When unset, derived from `pod_id` and `port`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_pod_id")]
    pub pod_id: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
    #[serde(default = "default_chat_timeout_secs")]
    pub chat_timeout_secs: u64,
    #[serde(default = "default_k")]
    pub default_k: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            pod_id: default_pod_id(),
            port: default_port(),
            health_timeout_secs: default_health_timeout_secs(),
            chat_timeout_secs: default_chat_timeout_secs(),
            default_k: default_k(),
        }
    }
}

fn default_pod_id() -> String {
    "i1q8dnudt5raii".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_health_timeout_secs() -> u64 {
    10
}
fn default_chat_timeout_secs() -> u64 {
    300
}
fn default_k() -> u32 {
    4
}

impl BackendConfig {
    /// Base URL of the backend without a trailing slash.
    pub fn base_url(&self) -> String {
        let url = match &self.url {
            Some(url) => url.clone(),
            None => format!("https://{}-{}.proxy.runpod.net", self.pod_id, self.port),
        };
        url.trim_end_matches('/').to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Custom S3-compatible endpoint. `None` means official AWS S3.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            endpoint_url: None,
            region: default_region(),
            prefix: default_prefix(),
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

fn default_bucket() -> String {
    "rag-teste-bnu".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_prefix() -> String {
    "uploads".to_string()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    200
}

impl StorageConfig {
    /// Human-readable endpoint label used in diagnostics.
    pub fn endpoint_label(&self) -> &str {
        self.endpoint_url.as_deref().unwrap_or("default AWS")
    }
}

/// Load configuration from `path` (if it exists), then apply environment
/// overrides and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    apply_env(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Apply environment overrides. Empty values count as unset.
pub fn apply_env<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get("BACKEND_URL") {
        config.backend.url = Some(url);
    }
    if let Some(pod_id) = get("POD_ID") {
        config.backend.pod_id = pod_id;
    }
    if let Some(bucket) = get("BUCKET_NAME") {
        config.storage.bucket = bucket;
    }
    if let Some(endpoint) = get("S3_ENDPOINT") {
        config.storage.endpoint_url = Some(endpoint);
    }
    if let Some(region) = get("AWS_REGION") {
        config.storage.region = region;
    }
}

/// Check invariants that the rest of the program relies on.
pub fn validate(config: &Config) -> Result<()> {
    if config.storage.bucket.trim().is_empty() {
        anyhow::bail!("storage.bucket must not be empty");
    }

    if config.storage.region.trim().is_empty() {
        anyhow::bail!("storage.region must not be empty");
    }

    if config.storage.max_attempts == 0 {
        anyhow::bail!("storage.max_attempts must be >= 1");
    }

    if let Some(endpoint) = &config.storage.endpoint_url {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            anyhow::bail!(
                "storage.endpoint_url must start with http:// or https:// (got '{}')",
                endpoint
            );
        }
    }

    if !(1..=10).contains(&config.backend.default_k) {
        anyhow::bail!("backend.default_k must be in [1, 10]");
    }

    if config.backend.health_timeout_secs == 0 || config.backend.chat_timeout_secs == 0 {
        anyhow::bail!("backend timeouts must be > 0");
    }

    Ok(())
}
