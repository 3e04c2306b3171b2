//! `lumen`: ask questions about your local documents.
//!
//! ```bash
//! lumen "what does the warranty cover?"
//! lumen --folder ~/Documents/manuals   # interactive
//! ```

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use lumen_cli::{init_logging, load_settings, print_answer, wait_for_index};
use lumen_core::config::RenderMode;
use lumen_engine::{CoreEvent, Engine, QueryRejected};

#[derive(Parser)]
#[command(name = "lumen")]
#[command(about = "Ask questions about the documents in your folders")]
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

    /// Print answers as HTML
    #[arg(long)]
    html: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Question to ask; omit for an interactive prompt
    question: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut settings = load_settings(cli.config.as_deref(), &cli.folders, cli.persist_dir.as_deref())?;
    if cli.html {
        settings.query.render = RenderMode::Html;
    }
    let render = settings.query.render;

    let (engine, mut events) = Engine::with_defaults();
    engine.configure(settings);
    wait_for_index(&mut events).await?;

    let mut stdout = io::stdout();
    if let Some(question) = cli.question {
        if !ask(&engine, &mut events, &question, render, &mut stdout).await? {
            bail!("Query failed (see log for details)");
        }
        return Ok(());
    }

    info!("Index ready; type a question, or an empty line to quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let Some(line) = lines.next_line().await? else { break };
        if line.trim().is_empty() {
            break;
        }
        if !ask(&engine, &mut events, &line, render, &mut stdout).await? {
            bail!("Query failed (see log for details)");
        }
        writeln!(stdout)?;
    }
    Ok(())
}

async fn ask(
    engine: &Engine,
    events: &mut UnboundedReceiver<CoreEvent>,
    question: &str,
    render: RenderMode,
    out: &mut impl Write,
) -> Result<bool> {
    let task = match engine.start_query(question) {
        Ok(task) => task,
        Err(QueryRejected::EmptyQuery) => return Ok(true),
        Err(rejected) => bail!("Query not started: {rejected}"),
    };
    let succeeded = print_answer(events, render, out).await?;
    task.await?;
    Ok(succeeded)
}
