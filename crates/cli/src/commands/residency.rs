//! vms residency command

use std::path::Path;
use std::sync::Arc;

use clap::{Args, Subcommand};
use console::style;
use federation::{Residency, ResidencyDetector};
use shared::{CompanyId, EntityType, TracingLogger};
use vms_adapter::in_memory_store;

use super::{load_config, require_platform};

#[derive(Debug, Args)]
pub struct ResidencyCommand {
    #[command(subcommand)]
    pub command: ResidencySubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ResidencySubcommand {
    /// Resolve where a company's data lives according to the Platform
    Resolve {
        /// Company id
        #[arg(long)]
        company: String,
        /// Only this entity type (employee, visitor, location)
        #[arg(long)]
        entity: Option<String>,
    },
}

impl ResidencyCommand {
    pub async fn run(&self, config_path: Option<&Path>) -> anyhow::Result<()> {
        let config = load_config(config_path)?;
        match &self.command {
            ResidencySubcommand::Resolve { company, entity } => {
                let detector = ResidencyDetector::new(
                    in_memory_store(),
                    Some(require_platform(&config)?),
                    config.residency.clone(),
                    Arc::new(TracingLogger),
                );
                let company = CompanyId::new(company.as_str());

                let resolved = match entity {
                    Some(entity) => {
                        let entity: EntityType = entity.parse()?;
                        vec![(entity, detector.detect(&company, entity).await?)]
                    }
                    None => detector.detect_all(&company).await?.into_iter().collect(),
                };

                println!("{} {}", style("company").bold(), company.as_str());
                for (entity, residency) in resolved {
                    println!("  {}", describe(entity, &residency));
                }
            }
        }
        Ok(())
    }
}

fn describe(entity: EntityType, residency: &Residency) -> String {
    format!(
        "{:<9} {:<8} ({})",
        entity.as_str(),
        style(residency.mode.as_str()).cyan(),
        residency.source.as_str()
    )
}
