//! CLI Commands

pub mod init;
pub mod manifest;
pub mod residency;
pub mod serve;
pub mod sync;

pub use init::InitCommand;
pub use manifest::ManifestCommand;
pub use residency::ResidencyCommand;
pub use serve::ServeCommand;
pub use sync::SyncCommand;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use platform::{HttpPlatformClient, PlatformClient};
use shared::VmsConfig;

/// Configuration picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "vms.yaml";

/// Load configuration, overlay `VMS_*` variables and validate
pub fn load_config(path: Option<&Path>) -> anyhow::Result<VmsConfig> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()));

    let mut config = match &path {
        Some(path) => VmsConfig::from_file(path).with_context(|| format!("failed to load {}", path.display()))?,
        None => VmsConfig::default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// HTTP Platform client when the Platform is enabled
pub fn platform_client(config: &VmsConfig) -> anyhow::Result<Option<Arc<dyn PlatformClient>>> {
    if !config.platform.enabled {
        return Ok(None);
    }
    let client = HttpPlatformClient::new(&config.platform)?;
    tracing::info!("Platform client for {}", client.base_url());
    Ok(Some(Arc::new(client)))
}

pub(crate) fn require_platform(config: &VmsConfig) -> anyhow::Result<Arc<dyn PlatformClient>> {
    match platform_client(config)? {
        Some(client) => Ok(client),
        None => bail!("the Platform is not enabled (set platform.baseUrl or VMS_PLATFORM_URL)"),
    }
}
