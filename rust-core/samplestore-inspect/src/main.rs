// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// samplestore-inspect: print the contents of a sampling store as JSON.
//
// ```text
// samplestore-inspect --path ./data/sampling.redb throughput --since 2026-10-17T09:00:00Z
// samplestore-inspect --path ./data/sampling.redb latest
// ```
//
// Nothing is written to the store.

use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use samplestore::{BackendKind, SamplingStoreConfig};

#[derive(Parser, Debug)]
#[command(name = "samplestore-inspect", version, about = "Inspect a sampling store")]
struct Cli {
    /// redb database file. Defaults to `SAMPLESTORE_PATH` or ./data/sampling.redb.
    #[arg(long)]
    path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Throughput batches inserted within a time window.
    Throughput {
        /// Window start (RFC 3339). Defaults to one hour before --until.
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Window end (RFC 3339). Defaults to now.
        #[arg(long)]
        until: Option<DateTime<Utc>>,
    },
    /// The most recent probabilities/QPS snapshot from any host.
    Latest,
}

/// Fill in a missing window end with `now` and a missing start with one
/// hour before the end.
fn resolve_window(
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
    let until = until.unwrap_or(now);
    let since = match since {
        Some(since) => since,
        None => match until.checked_sub_signed(Duration::hours(1)) {
            Some(since) => since,
            None => bail!("--until {until} is too early to default --since; pass --since explicitly"),
        },
    };
    Ok((since, until))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = SamplingStoreConfig::from_env().context("reading SAMPLESTORE_* environment")?;
    config.backend = BackendKind::Redb;
    if let Some(path) = cli.path {
        config.path = path;
    }
    // Opening a missing file would create an empty database.
    if !config.path.is_file() {
        bail!("no sampling store at {}", config.path.display());
    }

    let store = config
        .open_store()
        .with_context(|| format!("opening {}", config.path.display()))?;

    let output = match cli.command {
        Command::Throughput { since, until } => {
            let (since, until) = resolve_window(since, until, Utc::now())?;
            let batches = store
                .get_throughput_batches(since, until)
                .await
                .with_context(|| format!("reading throughput between {since} and {until}"))?;
            tracing::info!(batches = batches.len(), "read throughput window");
            serde_json::to_string_pretty(&batches)?
        }
        Command::Latest => {
            let latest = store
                .get_latest_probabilities_and_qps()
                .await
                .context("reading latest probabilities snapshot")?;
            if latest.is_none() {
                tracing::info!("store holds no probabilities snapshot");
            }
            serde_json::to_string_pretty(&latest)?
        }
    };

    println!("{output}");
    Ok(())
}
