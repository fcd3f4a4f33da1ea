//! vms manifest command

use std::path::PathBuf;

use anyhow::bail;
use clap::{Args, Subcommand};
use console::style;
use vms_core::{ActorManifest, ManifestLoader};

#[derive(Debug, Args)]
pub struct ManifestCommand {
    #[command(subcommand)]
    pub command: ManifestSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ManifestSubcommand {
    /// Load and validate every manifest in a directory
    Check {
        /// Manifest directory
        #[arg(default_value = "manifests")]
        dir: PathBuf,
    },
}

impl ManifestCommand {
    pub fn run(&self) -> anyhow::Result<()> {
        match &self.command {
            ManifestSubcommand::Check { dir } => {
                if !dir.is_dir() {
                    bail!("{} is not a directory", dir.display());
                }
                let mut loader = ManifestLoader::new();
                let manifest = loader.load_from_directory(dir)?;
                for file in loader.files() {
                    println!("  {} {}", style("loaded").green(), file);
                }
                print_manifest(&manifest);
                println!("{} Manifest is valid", style("✓").green());
            }
        }
        Ok(())
    }
}

fn print_manifest(manifest: &ActorManifest) {
    println!("{} {}", style("app").bold(), manifest.app);
    for mapping in &manifest.mappings {
        println!(
            "  {:<9} <- {} (writes as {})",
            mapping.entity.as_str(),
            mapping.actor_types.join(", "),
            mapping.write_type()
        );
    }
}
