//! vms serve command

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use console::style;
use shared::{Logger, TracingLogger, VmsConfig};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use vms_adapter::in_memory_store;
use vms_core::{ActorManifest, ManifestLoader, VmsCore};

use super::{load_config, platform_client};

#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Override the listening port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Do not start the sync retry worker
    #[arg(long)]
    pub no_sync: bool,
}

impl ServeCommand {
    pub async fn run(&self, config_path: Option<&Path>) -> anyhow::Result<()> {
        let mut config = load_config(config_path)?;
        if let Some(port) = self.port {
            config.server.port = port;
        }

        let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
        let manifest = load_manifest(&config)?;
        let platform = platform_client(&config)?;
        let core = Arc::new(VmsCore::from_config(&config, in_memory_store(), platform, manifest, logger)?);

        let (stop, stopped) = watch::channel(false);
        let worker = if self.no_sync {
            None
        } else {
            Some(Arc::new(core.sync_processor(&config)).spawn(stopped))
        };

        let address = config.server.address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("failed to bind {address}"))?;
        println!("{} VMS listening on {}", style("✓").green(), style(&address).bold());

        let router = vms_server::build_router(core);
        vms_server::serve(listener, router, vms_server::shutdown_signal()).await?;

        stop_worker(&stop, worker).await?;
        println!("{} VMS stopped", style("✓").green());
        Ok(())
    }
}

/// Signal the sync worker to stop and wait for it
async fn stop_worker(stop: &watch::Sender<bool>, worker: Option<JoinHandle<()>>) -> anyhow::Result<()> {
    if stop.send(true).is_err() {
        tracing::debug!("Sync worker was not running");
    }
    if let Some(worker) = worker {
        worker.await.context("sync worker panicked")?;
    }
    Ok(())
}

/// Manifest directory from configuration, or the builtin mappings
fn load_manifest(config: &VmsConfig) -> anyhow::Result<ActorManifest> {
    match &config.manifest.dir {
        Some(dir) => {
            let mut loader = ManifestLoader::new();
            let manifest = loader.load_from_directory(dir)?;
            tracing::info!("Loaded {} manifest file(s) from {}", loader.files().len(), dir.display());
            Ok(manifest)
        }
        None => Ok(ActorManifest::builtin()),
    }
}
