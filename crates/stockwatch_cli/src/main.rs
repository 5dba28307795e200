//! Command-line entry point.
//!
//! # Responsibility
//! - Run sweeps, score recomputations and ranking queries against one
//!   database and print the results as JSON.
//! - Host the periodic sweep loop (`watch`) until Ctrl-C.

use clap::{Parser, Subcommand};
use log::error;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use stockwatch_core::{
    default_log_level, init_logging, init_stderr_logging, ItemId, Stockwatch, StockwatchConfig,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "stockwatch")]
#[command(about = "Low-stock alerting and importance scoring", long_about = None)]
struct Cli {
    /// SQLite database path; created and migrated when missing.
    #[arg(long, default_value = "stockwatch.db")]
    db: PathBuf,

    /// TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Absolute directory for rolling log files; logs go to stderr otherwise.
    #[arg(long)]
    log_dir: Option<String>,

    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate every active alert rule once.
    Sweep,
    /// Check one item's rules against a quantity.
    CheckItem {
        item_id: ItemId,
        quantity: i64,
        /// Store the quantity before checking.
        #[arg(long)]
        persist: bool,
    },
    /// Recompute one item's importance score.
    Recalc { item_id: ItemId },
    /// Recompute every importance score.
    RecalcAll,
    /// Items with the highest importance scores.
    Top {
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: u32,
    },
    /// Low-stock items ranked by criticality ratio.
    Critical {
        #[arg(long)]
        max_quantity: Option<i64>,
    },
    /// Importance score statistics.
    Stats,
    /// Sweep on the configured interval until Ctrl-C.
    Watch,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    let logging = match &cli.log_dir {
        Some(dir) => init_logging(&level, dir),
        None => init_stderr_logging(&level),
    };
    if let Err(err) = logging {
        eprintln!("stockwatch: {err}");
        return ExitCode::FAILURE;
    }

    let config = match StockwatchConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("event=cli_start module=cli status=error error={err}");
            eprintln!("stockwatch: {err}");
            return ExitCode::FAILURE;
        }
    };

    let app = match Stockwatch::open(&cli.db, config) {
        Ok(app) => app,
        Err(err) => {
            error!("event=cli_start module=cli status=error error={err}");
            eprintln!("stockwatch: {err}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = run(&app, cli.command).await;
    app.shutdown().await;

    match outcome {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("stockwatch: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(app: &Stockwatch, command: Command) -> Result<String, Box<dyn std::error::Error>> {
    let value = match command {
        Command::Sweep => serde_json::to_value(app.alerts().run_full_alert_sweep().await?)?,
        Command::CheckItem {
            item_id,
            quantity,
            persist,
        } => {
            let check = if persist {
                app.set_item_quantity(item_id, quantity).await?
            } else {
                app.alerts().check_item_alerts(item_id, quantity).await?
            };
            serde_json::to_value(check)?
        }
        Command::Recalc { item_id } => {
            serde_json::to_value(app.scoring().recalculate_item_score(item_id).await?)?
        }
        Command::RecalcAll => serde_json::to_value(app.scoring().recalculate_all_scores().await?)?,
        Command::Top { limit } => serde_json::to_value(app.scoring().get_top_items(limit).await?)?,
        Command::Critical { max_quantity } => {
            serde_json::to_value(app.scoring().get_critical_items(max_quantity).await?)?
        }
        Command::Stats => serde_json::to_value(app.scoring().get_score_statistics().await?)?,
        Command::Watch => {
            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal_token.cancel();
                }
            });
            app.run_sweep_loop(shutdown).await;
            json!({ "status": "stopped" })
        }
    };

    Ok(serde_json::to_string_pretty(&value)?)
}
