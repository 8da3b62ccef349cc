//! relmap - command-line entry point.
//!
//! Connects to one database and runs a single maintenance command.

use clap::Parser;
use relmap::config::{CliArgs, Command, Config};
use relmap::migrate::MIGRATIONS_TABLE;
use relmap::{Database, OrmError};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(args: &CliArgs) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if args.json_logs {
        subscriber.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    init_tracing(&args);

    let config = Config::from_url(&args.database)?;
    info!(
        target = %config.masked_connection_string(),
        "Starting relmap v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db = Database::connect(config).await?;
    let result = run(&db, &args.command).await;
    db.close().await;

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        if let Some(suggestion) = e.suggestion() {
            eprintln!("hint: {}", suggestion);
        }
        return Err(e.into());
    }
    Ok(())
}

async fn run(db: &Database, command: &Command) -> Result<(), OrmError> {
    match command {
        Command::Ping => {
            db.ping().await?;
            let info = db.info().await?;
            println!("{}", to_json(&info)?);
        }
        Command::HasTable { name } => {
            let exists = db.schema().has_table(name).await?;
            println!("{}", exists);
        }
        Command::Migrations => {
            if !db.schema().has_table(MIGRATIONS_TABLE).await? {
                info!("No migrations table");
                return Ok(());
            }
            for record in db.migrator().applied().await? {
                println!("{}\t{}", record.version, record.executed_at);
            }
        }
        Command::Query { sql } => {
            let rows = db.fetch_all(sql, &[]).await?;
            let rows: Vec<_> = rows.iter().map(|r| r.to_json_map()).collect();
            println!("{}", to_json(&rows)?);
        }
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, OrmError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| OrmError::internal(format!("Failed to render JSON: {}", e)))
}
