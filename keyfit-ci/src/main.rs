//! keyfit-ci - Catalog Ingest service
//!
//! **Module Identity:**
//! - Name: keyfit-ci (Catalog Ingest)
//! - Invocation: CLI, run on demand or from a scheduler owned elsewhere
//!
//! **[CIN-OV-010]** Reconciles vehicle-transponder compatibility records
//! scraped from external catalogs into the canonical KeyFit database, and
//! validates the canonical dataset for structural defects. This is a
//! library-level engine with a command surface; it serves no network
//! protocol of its own.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keyfit_ci::config::CiConfig;
use keyfit_ci::sources::json_file::JsonFileAdapter;
use keyfit_ci::sources::transpondery::TransponderyAdapter;
use keyfit_ci::sources::uhs::UhsAdapter;
use keyfit_ci::sources::SourceAdapter;
use keyfit_ci::stats::SyncStats;
use keyfit_ci::workflow::{self, SyncOptions};

/// Command-line arguments for keyfit-ci
#[derive(Parser, Debug)]
#[command(name = "keyfit-ci")]
#[command(about = "Catalog ingest service for KeyFit")]
#[command(version)]
struct Cli {
    /// Root folder containing the KeyFit database
    #[arg(short, long, env = "KEYFIT_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run reconciliation for one or all catalog sources
    Sync {
        /// Which catalog to sync
        #[arg(long, value_enum, default_value = "all")]
        source: SourceArg,

        /// Batch file to replay (required with --source file)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Write the scraped batch to this path for later replay
        #[arg(long)]
        dump: Option<PathBuf>,

        /// Classify and report without writing to the store
        #[arg(long)]
        dry_run: bool,
    },
    /// Scan the canonical dataset for structural defects
    Validate,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SourceArg {
    Transpondery,
    Uhs,
    All,
    File,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyfit_ci=info,keyfit_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    info!("Starting keyfit-ci (Catalog Ingest)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let root_folder =
        keyfit_common::config::resolve_root_folder(cli.root_folder.as_deref(), "KEYFIT_ROOT_FOLDER");
    let db_path = keyfit_common::config::database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let pool = keyfit_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let config = CiConfig::load();

    match cli.command {
        Command::Sync {
            source,
            input,
            dump,
            dry_run,
        } => {
            let adapters: Vec<Box<dyn SourceAdapter>> = match source {
                SourceArg::Transpondery => vec![Box::new(TransponderyAdapter::new(&config)?)],
                SourceArg::Uhs => vec![Box::new(UhsAdapter::new(&config)?)],
                SourceArg::All => vec![
                    Box::new(TransponderyAdapter::new(&config)?),
                    Box::new(UhsAdapter::new(&config)?),
                ],
                SourceArg::File => {
                    let path = input
                        .context("--source file requires --input <path>")?;
                    vec![Box::new(JsonFileAdapter::new(path))]
                }
            };

            let mut total = SyncStats::new("all sources");
            let combined = adapters.len() > 1;
            for adapter in &adapters {
                let options = SyncOptions {
                    dry_run,
                    // One dump file per source so a combined run doesn't
                    // overwrite its own output
                    dump_path: dump.as_ref().map(|path| {
                        if combined {
                            path.with_extension(format!("{}.json", adapter.name()))
                        } else {
                            path.clone()
                        }
                    }),
                };
                let stats =
                    workflow::run_source_sync(&pool, adapter.as_ref(), &config, &options).await?;
                println!("{stats}");
                total.merge(stats);
            }
            if combined {
                println!("{total}");
            }
            Ok(())
        }
        Command::Validate => {
            let issues = workflow::validate_store(&pool).await?;
            if issues.is_empty() {
                println!("Canonical dataset is structurally clean.");
            } else {
                println!("{} issue(s) found:", issues.len());
                for issue in &issues {
                    println!("  {issue}");
                }
            }
            Ok(())
        }
    }
}
