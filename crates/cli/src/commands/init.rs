//! vms init command

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use dialoguer::Confirm;
use shared::VmsConfig;
use vms_core::ActorManifest;

const CONFIG_FILE: &str = "vms.yaml";
const MANIFEST_DIR: &str = "manifests";
const MANIFEST_FILE: &str = "vms.yaml";
const QUEUE_FILE: &str = "data/sync-queue.json";

#[derive(Debug, Args)]
pub struct InitCommand {
    /// Directory to initialize
    #[arg(default_value = ".")]
    pub directory: PathBuf,

    /// Overwrite existing files without asking
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub fn run(&self) -> anyhow::Result<()> {
        println!("Initializing VMS in {}", self.directory.display());

        let existing = existing_files(&self.directory);
        if !existing.is_empty() && !self.force {
            for path in &existing {
                println!("  {} {}", style("exists").yellow(), path.display());
            }
            let overwrite = Confirm::new()
                .with_prompt("Overwrite existing files?")
                .default(false)
                .interact()?;
            if !overwrite {
                println!("Nothing written");
                return Ok(());
            }
        }

        for path in write_files(&self.directory)? {
            println!("  {} {}", style("wrote").green(), path.display());
        }
        println!("{} VMS initialized", style("✓").green());
        Ok(())
    }
}

fn targets(dir: &Path) -> [PathBuf; 2] {
    [dir.join(CONFIG_FILE), dir.join(MANIFEST_DIR).join(MANIFEST_FILE)]
}

fn existing_files(dir: &Path) -> Vec<PathBuf> {
    targets(dir).into_iter().filter(|p| p.exists()).collect()
}

/// Starter configuration: file-backed sync queue, manifests next to the config
fn starter_config() -> VmsConfig {
    let mut config = VmsConfig::default();
    config.manifest.dir = Some(PathBuf::from(MANIFEST_DIR));
    config.sync.store_path = Some(PathBuf::from(QUEUE_FILE));
    config
}

fn write_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let [config_path, manifest_path] = targets(dir);
    std::fs::create_dir_all(dir.join(MANIFEST_DIR))?;
    std::fs::create_dir_all(dir.join("data"))?;

    std::fs::write(&config_path, serde_yaml::to_string(&starter_config())?)?;
    std::fs::write(&manifest_path, serde_yaml::to_string(&ActorManifest::builtin())?)?;
    Ok(vec![config_path, manifest_path])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_files_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_files(dir.path()).unwrap();
        assert_eq!(written.len(), 2);

        let config = VmsConfig::from_file(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.manifest.dir, Some(PathBuf::from(MANIFEST_DIR)));
        assert!(config.validate().is_ok());

        let manifest = federation::ManifestLoader::load_file(&written[1]).unwrap();
        assert_eq!(manifest, ActorManifest::builtin());
    }

    #[test]
    fn test_existing_files_detected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(existing_files(dir.path()).is_empty());

        std::fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
        assert_eq!(existing_files(dir.path()), vec![dir.path().join(CONFIG_FILE)]);
    }

    #[test]
    fn test_force_overwrites_without_prompt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "server:\n  port: 1\n").unwrap();

        InitCommand {
            directory: dir.path().to_path_buf(),
            force: true,
        }
        .run()
        .unwrap();

        let config = VmsConfig::from_file(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.server.port, 8080);
    }
}
