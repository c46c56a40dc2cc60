//! Bilingual voice answer service.
//!
//! ```bash
//! GOOGLE_API_KEY=... sahayak --config sahayak.json --port 5001
//! ```
//!
//! Environment: `GOOGLE_API_KEY` (required), `SAHAYAK_CONFIG`, `SAHAYAK_HOST`,
//! `SAHAYAK_PORT`, `SAHAYAK_INDEX_DIR`, `SAHAYAK_AUDIO_DIR`, `SAHAYAK_LOG`.
//! A `.env` file in the working directory is honoured.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use sahayak_lib::settings::AppConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file (defaults to ./sahayak.json when present)
    #[arg(short, long, env = "SAHAYAK_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address, overriding configuration and SAHAYAK_HOST
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overriding configuration and SAHAYAK_PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("[sahayak] startup failed: {err:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let _ = dotenvy::dotenv();
    sahayak_lib::init_tracing();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())
        .map_err(|err| anyhow!(err.to_string()))
        .context("failed to load configuration")?;

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    sahayak_lib::run_server(config).await
}
