use anyhow::Result;
use campusdesk_core::DeskState;
use campusdesk_db::SqliteStore;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod dispatch;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    let config = config::Config::load(&args.config)?;
    init_tracing(args.log_json || config.logging.json);

    ensure_data_dir(&config.database.url)?;
    let pool =
        campusdesk_db::create_pool(&config.database.url, config.database.max_connections).await?;
    campusdesk_db::run_migrations(&pool).await?;
    if matches!(args.command, cli::Command::Migrate) {
        tracing::info!(url = %config.database.url, "database is up to date");
        return Ok(());
    }

    let state = DeskState::new(
        Arc::new(SqliteStore::new(pool)),
        config.engine.core_config(),
    );
    match dispatch::run(&state, &args.command, args.user.as_deref(), args.role).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => {
            tracing::debug!(error = %err, code = err.code(), "command failed");
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&dispatch::ErrorBody::from(&err))?
            );
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr so stdout carries only command output.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("campusdesk=info,sqlx=warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the parent directory of a file-backed SQLite URL.
fn ensure_data_dir(url: &str) -> Result<()> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
