//! Valsync - command-line front end for the spreadsheet sync client.
//!
//! The worksheet is a JSON grid in the data directory. `load` projects a
//! valuation onto it, `edit` changes an input the way a user would in the
//! sheet, and `push` sends the edits back.

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use valsync_client::{
    Config, Conflict, ConflictResolver, ConnectivityMonitor, FileStore, FixedResolution,
    HttpValuationApi, JsonFileWorksheet, KeyValueStore, LocalCache, LocalQueue, Resolution,
    SpreadsheetAdapter, SyncController, ValuationApi, AUTH_TOKEN_KEY,
};
use valsync_engine::CellValue;

#[derive(Debug, Parser)]
#[command(name = "valsync", version, about = "Sync valuations between a sheet and the platform")]
struct Cli {
    /// Treat the network as unavailable
    #[arg(long, global = true)]
    offline: bool,

    /// Base URL of the spreadsheet API
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory holding the local store and sheet
    #[arg(long, global = true)]
    data_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pull a valuation into the sheet
    Load { id: String },
    /// Change an input value in the sheet
    Edit { key: String, value: String },
    /// Push the sheet's inputs to the platform
    Push {
        /// On a version conflict, overwrite the server's data
        #[arg(long, conflicts_with = "abandon")]
        overwrite: bool,
        /// On a version conflict, drop the local edits
        #[arg(long)]
        abandon: bool,
    },
    /// Replay writes queued while offline
    Drain,
    /// Show connectivity and pending writes
    Status,
    /// List companies
    Companies,
    /// List recent valuation runs
    Runs {
        /// How many runs to fetch
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Store the bearer token
    Token { value: String },
    /// Forget the stored bearer token
    Logout,
    /// Drop queued writes for a valuation
    Discard { id: String },
}

/// Asks on the terminal whether to overwrite.
struct PromptResolver;

#[async_trait]
impl ConflictResolver for PromptResolver {
    async fn resolve(&self, conflict: &Conflict) -> Resolution {
        let message = format!(
            "Conflict on {}: {}\nOverwrite server data with your version? [y/N] ",
            conflict.valuation_id, conflict.message
        );

        let answer = tokio::task::spawn_blocking(move || {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(message.as_bytes());
            let _ = stdout.flush();

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) if matches!(line.trim(), "y" | "Y" | "yes") => Resolution::Overwrite,
            _ => Resolution::Abandon,
        }
    }
}

/// Typed value for a sheet cell, as the host would coerce typed text.
/// Only finite numbers become numbers; `NaN` or `inf` stay text.
fn parse_cell(raw: &str) -> CellValue {
    match raw {
        "" => CellValue::Empty,
        "true" | "TRUE" => CellValue::Bool(true),
        "false" | "FALSE" => CellValue::Bool(false),
        _ => raw
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(CellValue::Number)
            .unwrap_or_else(|| CellValue::text(raw)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "valsync=info,valsync_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env_with(cli.api_url, cli.data_dir)?;

    let store = Arc::new(FileStore::open(config.store_dir()).await?);
    let token = match config.auth_token.clone() {
        Some(token) => Some(token),
        None => store.get(AUTH_TOKEN_KEY).await?,
    };

    let api = Arc::new(HttpValuationApi::new(&config.api_url, token, config.timeout)?);
    let sheet = Arc::new(JsonFileWorksheet::new(config.sheet_path()));
    let connectivity = Arc::new(ConnectivityMonitor::new(!cli.offline));

    let controller = SyncController::new(
        api.clone(),
        Arc::new(LocalCache::new(store.clone())),
        Arc::new(LocalQueue::new(store.clone())),
        connectivity,
        SpreadsheetAdapter::new(sheet.clone()),
    );

    tracing::debug!("Using {} with data in {}", config.api_url, config.data_dir.display());

    match cli.command {
        Command::Load { id } => {
            let report = controller.load_to_sheet(&id).await?;
            println!("{}", report.message());
        }
        Command::Edit { key, value } => {
            sheet.set_input(&key, parse_cell(&value)).await?;
            println!("Set {} = {}", key, value);
        }
        Command::Push { overwrite, abandon } => {
            let outcome = if overwrite {
                controller
                    .sync_to_platform(&FixedResolution(Resolution::Overwrite))
                    .await?
            } else if abandon {
                controller
                    .sync_to_platform(&FixedResolution(Resolution::Abandon))
                    .await?
            } else {
                controller.sync_to_platform(&PromptResolver).await?
            };
            println!("{}", outcome.message());
        }
        Command::Drain => {
            let report = controller.drain().await?;
            println!("{}", report.message());
            for failure in &report.failures {
                match failure.status {
                    Some(status) => println!(
                        "  {} ({}) [{}]: {}",
                        failure.valuation_id, failure.entry_id, status, failure.error
                    ),
                    None => println!(
                        "  {} ({}): {}",
                        failure.valuation_id, failure.entry_id, failure.error
                    ),
                }
            }
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&controller.status().await)?);
        }
        Command::Companies => {
            for company in api.companies().await? {
                println!("{}", company);
            }
        }
        Command::Runs { limit } => {
            for run in api.runs(limit).await? {
                let value = run
                    .enterprise_value
                    .map(|v| format!("{:.2}", v))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    run.id,
                    run.company_name.as_deref().unwrap_or("-"),
                    run.mode.as_deref().unwrap_or("-"),
                    run.created_at.as_deref().unwrap_or("-"),
                    value
                );
            }
        }
        Command::Token { value } => {
            store.set(AUTH_TOKEN_KEY, value.trim()).await?;
            println!("Token saved");
        }
        Command::Logout => {
            store.remove(AUTH_TOKEN_KEY).await?;
            println!("Logged out");
        }
        Command::Discard { id } => {
            let removed = controller.discard(&id).await?;
            println!("Discarded {} queued write(s) for {}", removed, id);
        }
    }

    Ok(())
}
