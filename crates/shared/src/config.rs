//! Configuration types for VMS

use crate::{ResidencyMode, Result, VmsError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Upper bound for residency cache TTLs (one week)
pub const MAX_RESIDENCY_TTL_SECS: u64 = 7 * 24 * 3600;

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Connection to the remote Platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub app_id: String,
    pub timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            api_key: None,
            app_id: "vms".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Residency detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResidencyConfig {
    pub default_mode: ResidencyMode,
    pub cache_ttl_secs: u64,
    /// TTL for results computed while the Platform was failing
    pub error_cache_ttl_secs: u64,
}

impl Default for ResidencyConfig {
    fn default() -> Self {
        Self {
            default_mode: ResidencyMode::App,
            cache_ttl_secs: 300,
            error_cache_ttl_secs: 30,
        }
    }
}

/// Sync queue and retry worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
    pub poll_interval_secs: u64,
    pub batch_size: usize,
    /// JSON document holding the queue; in-memory when unset
    pub store_path: Option<PathBuf>,
    /// In-progress operations older than this are treated as abandoned
    pub stale_after_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay_secs: 30,
            max_delay_secs: 3600,
            poll_interval_secs: 15,
            batch_size: 50,
            store_path: None,
            stale_after_secs: 600,
        }
    }
}

/// Audit trail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditConfig {
    pub max_entries: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { max_entries: 10_000 }
    }
}

/// Actor manifest location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestConfig {
    pub dir: Option<PathBuf>,
}

/// Top-level configuration (vms.yaml / vms.json)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VmsConfig {
    pub server: ServerConfig,
    pub platform: PlatformConfig,
    pub residency: ResidencyConfig,
    pub sync: SyncConfig,
    pub audit: AuditConfig,
    pub manifest: ManifestConfig,
}

impl VmsConfig {
    /// Load configuration from a YAML or JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config: Self = if is_json {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        Ok(config)
    }

    /// Overlay `VMS_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("VMS_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_var::<u16>(&lookup, "VMS_PORT") {
            self.server.port = port;
        }
        if let Some(url) = lookup("VMS_PLATFORM_URL") {
            if !url.trim().is_empty() {
                self.platform.base_url = Some(url.trim().to_string());
                self.platform.enabled = true;
            }
        }
        if let Some(key) = lookup("VMS_PLATFORM_API_KEY") {
            self.platform.api_key = Some(key);
        }
        if let Some(path) = lookup("VMS_SYNC_STORE") {
            self.sync.store_path = Some(PathBuf::from(path));
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.platform.enabled && self.platform.base_url.as_deref().map_or(true, str::is_empty) {
            return Err(VmsError::Config("platform.baseUrl is required when the platform is enabled".to_string()));
        }
        if self.sync.max_attempts == 0 {
            return Err(VmsError::Config("sync.maxAttempts must be at least 1".to_string()));
        }
        if self.sync.base_delay_secs > self.sync.max_delay_secs {
            return Err(VmsError::Config("sync.baseDelaySecs exceeds sync.maxDelaySecs".to_string()));
        }
        if self.sync.batch_size == 0 {
            return Err(VmsError::Config("sync.batchSize must be positive".to_string()));
        }
        if self.residency.cache_ttl_secs > MAX_RESIDENCY_TTL_SECS
            || self.residency.error_cache_ttl_secs > MAX_RESIDENCY_TTL_SECS
        {
            return Err(VmsError::Config(format!(
                "residency cache TTLs must not exceed {} seconds",
                MAX_RESIDENCY_TTL_SECS
            )));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    raw.trim()
        .parse()
        .map_err(|e| {
            warn!("Ignoring invalid {key} value '{raw}': {e}");
        })
        .ok()
}
