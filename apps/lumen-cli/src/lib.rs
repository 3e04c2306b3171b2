//! Shared plumbing for the `lumen` binaries: logging, settings and the
//! event-loop helpers that turn engine events into terminal output.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

use lumen_core::config::{Config, RenderMode, Settings};
use lumen_core::extract::FileKind;
use lumen_core::types::{IndexingState, QueryState};
use lumen_engine::CoreEvent;

/// Log to stderr so streamed answers on stdout stay clean.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load settings from `path` (or `./config.toml`) and apply command-line
/// folder and persistence overrides.
pub fn load_settings(path: Option<&Path>, folders: &[PathBuf], persist_dir: Option<&Path>) -> Result<Settings> {
    let config = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    let mut settings = config.settings().context("Invalid configuration")?;
    if !folders.is_empty() {
        settings.index.search_dirs = folders.to_vec();
    }
    if let Some(dir) = persist_dir {
        settings.index.persist_dir = Some(dir.to_path_buf());
    }
    if !settings.is_complete() {
        bail!(
            "Configuration incomplete: need search folders, a persistence directory and an API key \
             (set OPENAI_API_KEY or [openai].api_key)"
        );
    }
    Ok(settings)
}

/// Block until the index is `LOADED`; an `ERROR` state is reported as a failure.
pub async fn wait_for_index(rx: &mut UnboundedReceiver<CoreEvent>) -> Result<()> {
    while let Some(event) = rx.recv().await {
        match event {
            CoreEvent::IndexingStateChanged(IndexingState::Loaded) => return Ok(()),
            CoreEvent::IndexingStateChanged(IndexingState::Error) => {
                bail!("Index could not be loaded or built (see log for details)")
            }
            _ => {}
        }
    }
    bail!("Engine stopped before the index was ready")
}

/// Print one query's answer, then its sources. Plain answers stream as
/// they arrive; HTML is printed once, fully rendered. Returns whether the
/// query finished successfully.
pub async fn print_answer(
    rx: &mut UnboundedReceiver<CoreEvent>,
    render: RenderMode,
    out: &mut impl Write,
) -> Result<bool> {
    let mut printed = String::new();
    while let Some(event) = rx.recv().await {
        match event {
            CoreEvent::PartialAnswer(partial) if render == RenderMode::Plain => {
                if let Some(delta) = partial.strip_prefix(printed.as_str()) {
                    write!(out, "{delta}")?;
                    out.flush()?;
                }
                printed = partial;
            }
            CoreEvent::FinalAnswer(answer) if render == RenderMode::Html => {
                writeln!(out, "{}", answer.rendered)?;
            }
            CoreEvent::FinalAnswer(answer) => {
                // Held-back text that never became the marker.
                if let Some(rest) = answer.answer.strip_prefix(printed.as_str()) {
                    write!(out, "{rest}")?;
                }
                writeln!(out)?;
                if !answer.sources.is_empty() {
                    writeln!(out, "\nSources:")?;
                    for source in &answer.sources {
                        writeln!(out, "  [{}] {source}", source_label(source))?;
                    }
                }
            }
            CoreEvent::QueryStateChanged(QueryState::Standby) => return Ok(true),
            CoreEvent::QueryStateChanged(QueryState::Error) => return Ok(false),
            _ => {}
        }
    }
    bail!("Engine stopped while answering")
}

pub fn source_label(source: &str) -> &'static str {
    FileKind::of(Path::new(source)).map_or("file", FileKind::label)
}
