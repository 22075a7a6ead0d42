//! taxon - taxonomy import and tag unification console.
//!
//! ```text
//! taxon template taxonomy -o nodes.csv
//! taxon preview taxonomy nodes.csv
//! taxon import taxonomy nodes.csv --chunk-size 500
//! taxon suggest --json
//! taxon apply <ID> --decision confirm --context pediatria
//! taxon migrate
//! ```

mod cli;
mod commands;
mod logging;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};

use taxon_db::{log_pool_metrics, Database, MemoryStore, PoolConfig};
use taxon_dedup::ApplyOptions;
use taxon_import::ImportStores;

use cli::{delimiter_or_default, Cli, Commands, DbArgs};
use commands::Status;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _guard = logging::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(status) => status.into(),
        Err(e) => {
            error!(subsystem = "cli", error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn connect(db: &DbArgs, concurrency: usize) -> Result<Database> {
    debug!(
        subsystem = "cli",
        max_connections = db.max_connections,
        concurrency,
        "Connecting to database"
    );
    let config = PoolConfig::new()
        .max_connections(db.max_connections)
        .sized_for(concurrency);
    Ok(Database::connect_with_config(&db.database_url, config).await?)
}

async fn run(cli: Cli) -> Result<Status> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let status = match cli.command {
        Commands::Template {
            kind,
            output,
            delimiter,
        } => {
            let delimiter = delimiter_or_default(delimiter.as_deref())?;
            commands::template(kind, output.as_deref(), delimiter, &mut out)?
        }
        Commands::Preview {
            kind,
            file,
            delimiter,
            json,
        } => {
            let tuning = cli::ImportTuning {
                delimiter,
                ..Default::default()
            };
            commands::preview(kind, &file, tuning.resolve()?, json, &mut out)?
        }
        Commands::Import {
            kind,
            file,
            tuning,
            dry_run,
            json,
            db,
        } => {
            let config = tuning.resolve()?;
            if dry_run {
                let stores = ImportStores::from_shared(Arc::new(MemoryStore::new()));
                commands::import(kind, &file, stores, config, json, &mut out).await?
            } else {
                let database = connect(&db, config.concurrency).await?;
                let stores = commands::database_stores(&database);
                let status = commands::import(kind, &file, stores, config, json, &mut out).await?;
                log_pool_metrics(&database.pool);
                status
            }
        }
        Commands::Suggest { tuning, json, db } => {
            let config = tuning.resolve()?;
            let database = connect(&db, 1).await?;
            commands::suggest(&database.tags, &config, json, &mut out).await?
        }
        Commands::Apply {
            id,
            decision,
            context,
            actor,
            tuning,
            db,
        } => {
            let config = tuning.resolve()?;
            let database = connect(&db, 1).await?;
            let options = ApplyOptions { actor, context };
            commands::apply(&database.tags, &config, id, decision, &options, &mut out).await?
        }
        Commands::Migrate { db } => {
            let database = connect(&db, 1).await?;
            commands::migrate(&database).await?
        }
    };

    out.flush()?;
    Ok(status)
}
