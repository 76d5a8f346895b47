use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ddi_ingest::{DatasetService, ServiceConfig, StoreKind};
use ddi_storage::PgStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ddi-cli")]
#[command(about = "Device data ingest command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP service.
    Serve,
    /// Apply database migrations.
    Migrate,
    /// Submit a JSON array of records to an open dataset.
    Ingest {
        #[arg(long)]
        dataset: String,
        file: PathBuf,
    },
    /// Close a dataset and run its finalize step.
    Finalize {
        #[arg(long)]
        dataset: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => ddi_web::serve_from_env().await?,
        Commands::Migrate => {
            let config = ServiceConfig::from_env();
            if config.store == StoreKind::Memory {
                bail!("DDI_STORE=memory has no schema to migrate");
            }
            let store = PgStore::connect(&config.pg_config())
                .await
                .context("connecting to postgres")?;
            store.migrate().await?;
            println!("migrations applied");
        }
        Commands::Ingest { dataset, file } => {
            let raw = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let raw: serde_json::Value =
                serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
            let service = DatasetService::from_config(&ServiceConfig::from_env()).await?;
            match service.add_dataset_data(&dataset, &raw).await {
                Ok(added) => println!(
                    "ingest complete: dataset={} submitted={} created={} duplicates={}",
                    dataset, added.submitted, added.created, added.duplicates
                ),
                Err(ddi_ingest::IngestError::Invalid(issues)) => {
                    for issue in &issues {
                        eprintln!("{issue}");
                    }
                    bail!("{} issues in {}", issues.len(), file.display());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Finalize { dataset } => {
            let service = DatasetService::from_config(&ServiceConfig::from_env()).await?;
            let closed = service.finalize_dataset(&dataset).await?;
            info!(upload_id = %closed.upload_id, "dataset finalized");
            println!("finalize complete: dataset={} state={}", closed.upload_id, closed.data_state);
        }
    }

    Ok(())
}
