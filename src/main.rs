//! jra-picks: batch CLI and HTTP server for the pick engine.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jra_picks::api::{self, AppState};
use jra_picks::config::AppConfig;
use jra_picks::metrics::Metrics;
use jra_picks::store;

#[derive(Parser)]
#[command(name = "jra-picks")]
#[command(version, about = "Top-5 picks and congestion index for JRA races", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a day of races and write one report per venue
    Predict {
        /// Day input JSON: {"date": "YYYYMMDD", "races": [...]}
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        out_dir: PathBuf,
    },

    /// Settle the day's reports against official results and refresh totals
    Settle {
        /// Results JSON: {"date": "YYYYMMDD", "results": [...]}
        #[arg(value_name = "FILE")]
        results: PathBuf,

        /// Directory holding the prediction files
        #[arg(short, long, default_value = "output")]
        out_dir: PathBuf,
    },

    /// Start the HTTP API
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jra_picks=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present; real environment wins.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load().context("loading configuration")?;

    match cli.command {
        Commands::Predict { input, out_dir } => {
            let summary = store::predict_to_dir(&input, &out_dir, &config)?;
            info!(
                scored = summary.scored,
                skipped = summary.skipped,
                files = summary.files.len(),
                "predict done"
            );
        }
        Commands::Settle { results, out_dir } => {
            let written = store::settle_to_dir(&results, &out_dir, &config)?;
            info!(files = written.len(), "settle done");
        }
        Commands::Serve { host, port } => {
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("invalid bind address {host}:{port}"))?;
            let state = AppState::new(config).with_metrics(Metrics::init()?);
            let app = api::router(state);

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            info!(%addr, "listening");
            axum::serve(listener, app).await?;
        }
    }
    Ok(())
}
