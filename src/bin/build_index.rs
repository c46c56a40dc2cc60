//! Offline builder for the knowledge index served by `sahayak`.
//!
//! Reads every `.txt` and `.md` file under a source directory, splits them
//! into overlapping passages, embeds and persists them, then stamps the index
//! manifest with the embedding model so the service can verify it at startup.
//!
//! ```bash
//! sahayak-index knowledge/ --config sahayak.json --chunk-size 1000 --overlap 200
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use sahayak_lib::infrastructure::text_split::split_passages;
use sahayak_lib::settings::AppConfig;

const SOURCE_EXTENSIONS: &[&str] = &["txt", "md"];

#[derive(Parser, Debug)]
#[command(author, version, about = "Build the Sahayak knowledge index", long_about = None)]
struct Args {
    /// Directory holding the knowledge documents
    source: PathBuf,

    /// JSON configuration file (defaults to ./sahayak.json when present)
    #[arg(short, long, env = "SAHAYAK_CONFIG")]
    config: Option<PathBuf>,

    /// Passage size in characters
    #[arg(long, default_value_t = 1000)]
    chunk_size: usize,

    /// Characters shared between consecutive passages
    #[arg(long, default_value_t = 200)]
    overlap: usize,

    /// Delete an existing index before building
    #[arg(long)]
    reset: bool,
}

fn main() {
    let _ = dotenvy::dotenv();
    sahayak_lib::init_tracing();

    if let Err(err) = run(Args::parse()) {
        eprintln!("[sahayak-index] build failed: {err:?}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    if args.overlap >= args.chunk_size {
        bail!(
            "overlap ({}) must be smaller than chunk size ({})",
            args.overlap,
            args.chunk_size
        );
    }

    let config = AppConfig::load(args.config.as_deref())
        .map_err(|err| anyhow!(err.to_string()))
        .context("failed to load configuration")?;

    if args.reset && config.index.dir.exists() {
        warn!(dir = %config.index.dir.display(), "removing existing index");
        fs::remove_dir_all(&config.index.dir)
            .with_context(|| format!("failed to remove {:?}", config.index.dir))?;
    }

    let knowledge = sahayak_lib::open_knowledge(&config)?;
    let existing = knowledge
        .passage_count()
        .map_err(|err| anyhow!(err.to_string()))?;
    if existing > 0 {
        bail!(
            "index at {:?} already holds {existing} passages; pass --reset to rebuild",
            config.index.dir
        );
    }

    let mut files = Vec::new();
    collect_sources(&args.source, &mut files)
        .with_context(|| format!("failed to scan {:?}", args.source))?;
    files.sort();
    if files.is_empty() {
        bail!("no .txt or .md files found under {:?}", args.source);
    }

    let mut total = 0;
    for path in &files {
        let text = fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
        let passages = split_passages(&text, args.chunk_size, args.overlap);
        let source = path
            .strip_prefix(&args.source)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();

        let stored = knowledge
            .ingest_batch(&source, &passages)
            .map_err(|err| anyhow!(err.to_string()))
            .with_context(|| format!("failed to index {source}"))?;
        info!(source = %source, passages = stored, "document indexed");
        total += stored;
    }

    let manifest = knowledge
        .stamp_manifest()
        .map_err(|err| anyhow!(err.to_string()))
        .context("failed to write index manifest")?;
    info!(
        files = files.len(),
        passages = total,
        model = %manifest.model,
        dimensions = manifest.dimensions,
        "knowledge index built"
    );

    Ok(())
}

fn collect_sources(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_sources(&path, out)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        {
            out.push(path);
        }
    }
    Ok(())
}
