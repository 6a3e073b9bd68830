mod routes;
mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mix_store::Store;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::routes::make_router_with_cors;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "mix_daemon", about = "Compost mix composer HTTP service")]
struct Cli {
    /// Directory holding catalog.json and config.json.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,
    #[arg(long, default_value_t = 3001)]
    port: u16,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
    /// Add the sample residues before serving.
    #[arg(long)]
    seed: bool,
}

fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut store = Store::open(&cli.data_dir)
        .with_context(|| format!("opening data directory {}", cli.data_dir.display()))?;
    if cli.seed {
        store.seed_sample_materials()?;
    }

    let app = make_router_with_cors(AppState::new(store), &cli.cors_origin)?;
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cli.port))
        .await
        .with_context(|| format!("binding port {}", cli.port))?;
    tracing::info!(
        port = cli.port,
        data_dir = %cli.data_dir.display(),
        "mix_daemon listening"
    );
    axum::serve(listener, app).await.context("serving HTTP")?;
    Ok(())
}
