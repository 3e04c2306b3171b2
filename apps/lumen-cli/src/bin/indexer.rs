//! `lumen-indexer`: build (or reload) the persisted index without asking
//! anything, optionally probing it with a retrieval-only lookup.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use lumen_cli::{init_logging, load_settings, source_label, wait_for_index};
use lumen_engine::Engine;

#[derive(Parser)]
#[command(name = "lumen-indexer")]
#[command(about = "Build or load the document index")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ./config.toml)
    #[arg(short, long, env = "LUMEN_CONFIG")]
    config: Option<PathBuf>,

    /// Folder to index; repeat for several (overrides [index].search_dirs)
    #[arg(short, long = "folder")]
    folders: Vec<PathBuf>,

    /// Where the index is persisted (overrides [index].persist_dir)
    #[arg(short, long)]
    persist_dir: Option<PathBuf>,

    /// Show the closest chunks for this text once the index is ready
    #[arg(long)]
    probe: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = load_settings(cli.config.as_deref(), &cli.folders, cli.persist_dir.as_deref())?;
    for dir in &settings.index.search_dirs {
        info!("Search folder: {}", dir.display());
    }

    let started = Instant::now();
    let (engine, mut events) = Engine::with_defaults();
    engine.configure(settings);
    wait_for_index(&mut events).await?;
    info!("Index ready in {:.1}s", started.elapsed().as_secs_f64());

    if let Some(text) = cli.probe {
        for (rank, hit) in engine.retrieve(&text).await?.iter().enumerate() {
            println!("{}. [{}] {} ({:.3})", rank + 1, source_label(&hit.source_path), hit.source_path, hit.score);
            println!("   {}", preview(&hit.text, 160));
        }
    }
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &flat[..end]),
        None => flat,
    }
}
