//! Thin runner for post-hoc cascade labeling and threshold set import/export.
//! Contains no core logic of its own — see `domain::labeler` and
//! `domain::threshold::store`.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use hl_cascade_watch::config::AppConfig;
use hl_cascade_watch::domain::labeler::CascadeLabeler;
use hl_cascade_watch::domain::threshold::{export_to_json, import_from_json, ThresholdSet};
use hl_cascade_watch::infrastructure::persistence::SqliteRawStore;

#[derive(Parser, Debug)]
#[command(about = "Cascade labeling and threshold set import/export runner")]
struct Args {
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Label cascades for one coin over a time range (RFC 3339 timestamps).
    Label {
        coin: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Export a threshold set from a JSON file to stdout (validates round-trip).
    ExportThresholds { path: String },
    /// Import a threshold set from a JSON file and print its summary.
    ImportThresholds { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match args.command {
        Command::Label { coin, start, end } => {
            let mut config = AppConfig::from_env()?;
            if let Some(url) = args.database_url {
                config.database_url = url;
            }
            let store = Arc::new(SqliteRawStore::connect(&config.database_url).await?);
            let labeler = CascadeLabeler::new(store);
            let cascades = labeler.label_range(&coin, start, end).await?;
            println!("{}", serde_json::to_string_pretty(&cascade_summaries(&cascades))?);
        }
        Command::ExportThresholds { path } => {
            let raw = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            let set: ThresholdSet = import_from_json(&raw)?;
            println!("{}", export_to_json(&set)?);
        }
        Command::ImportThresholds { path } => {
            let raw = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            let set: ThresholdSet = import_from_json(&raw)?;
            println!(
                "imported threshold set '{}' (version {}, {} thresholds)",
                set.strategy_name,
                set.version,
                set.thresholds.len()
            );
        }
    }

    Ok(())
}

fn cascade_summaries(cascades: &[hl_cascade_watch::domain::labeler::LabeledCascade]) -> Vec<serde_json::Value> {
    cascades
        .iter()
        .map(|c| {
            serde_json::json!({
                "coin": c.coin,
                "start_ts": c.start_ts,
                "end_ts": c.end_ts,
                "oi_drop_pct": c.oi_drop_pct,
                "liquidation_count": c.liquidation_count,
                "waves": c.waves.len(),
                "outcome": c.outcome.as_str(),
            })
        })
        .collect()
}
