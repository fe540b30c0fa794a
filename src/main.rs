use anyhow::{Context, Result};
use cardindex::{Config, ForceFlags, Mode};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Builds the client card index from the bulk catalog and the client database.
///
/// Without a mode only missing artifacts are built.
#[derive(Parser, Debug)]
#[command(name = "cardindex")]
#[command(version)]
struct Args {
    /// Stage to recompute: dl, extract, cache, ratings, jmp, symb or set
    mode: Option<String>,

    /// Comma separated set codes for the `set` mode
    sets: Option<String>,

    /// Configuration file
    #[arg(short, long, env = "CARDINDEX_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the client's card database files
    #[arg(long)]
    client_db_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mode = args
        .mode
        .as_deref()
        .map(|m| Mode::parse(m, args.sets.as_deref()))
        .transpose()
        .context("Invalid mode")?;
    let force = ForceFlags::from_mode(mode.as_ref());

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = args.client_db_dir {
        config.client_db_dir = Some(dir);
        config.client_db_json = None;
    }
    config.validate().context("Invalid configuration")?;
    info!(?mode, data_dir = %config.data_dir.display(), output_dir = %config.output_dir.display(), "Starting");

    let artifacts = cardindex::run(&config, &force).context("Card index build failed")?;
    info!(
        written = artifacts.written.len(),
        reused = artifacts.reused.len(),
        cards = artifacts.cards,
        "Done"
    );
    Ok(())
}
