//! LanceDB-backed index store.
//!
//! A persisted index is one directory holding the LanceDB dataset for the
//! `chunks` table and a `lumen-manifest.json` written once the table is
//! complete. Building into a directory that holds anything else fails.

pub mod manifest;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use lumen_core::traits::{Embedder, IndexBackend, IndexHandle};
use lumen_core::types::Corpus;
use lumen_core::{Error, Result};

use crate::manifest::{Manifest, MANIFEST_FILE};
use crate::search::LanceIndex;
use crate::table::{open_chunk_table, open_db, CHUNK_TABLE};

#[derive(Debug, Clone, Copy, Default)]
pub struct LanceIndexStore;

impl LanceIndexStore {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn check_dir(persist_dir: &Path) -> Result<()> {
    if persist_dir.as_os_str().is_empty() {
        return Err(Error::InvalidPath("persistence directory is empty".to_string()));
    }
    if persist_dir.to_str().is_none() {
        return Err(Error::InvalidPath(format!("{} is not valid UTF-8", persist_dir.display())));
    }
    Ok(())
}

/// Files and directories of a persisted index, relative to its directory.
fn index_entries() -> [String; 2] {
    [format!("{CHUNK_TABLE}.lance"), MANIFEST_FILE.to_string()]
}

/// Refuse to build into a directory that holds anything besides a
/// previous index.
fn check_foreign(persist_dir: &Path) -> Result<()> {
    let entries = match fs::read_dir(persist_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::Persistence(format!("cannot read {}: {e}", persist_dir.display()))),
    };
    let owned = index_entries();
    for entry in entries {
        let entry = entry.map_err(|e| Error::Persistence(format!("cannot read {}: {e}", persist_dir.display())))?;
        let name = entry.file_name();
        if !owned.iter().any(|own| name.to_str() == Some(own.as_str())) {
            return Err(Error::Persistence(format!(
                "{} is not empty and holds no index (found {}); choose an empty persistence directory",
                persist_dir.display(),
                name.to_string_lossy()
            )));
        }
    }
    Ok(())
}

/// Remove a persisted index: the table and manifest, then the directory
/// itself once it is empty. Other files are left alone, and a missing
/// index is not an error.
fn remove_index(persist_dir: &Path) -> Result<()> {
    let failed = |path: &Path, e: io::Error| Error::Persistence(format!("cannot remove {}: {e}", path.display()));
    for name in index_entries() {
        let path = persist_dir.join(name);
        let removed = if path.is_dir() { fs::remove_dir_all(&path) } else { fs::remove_file(&path) };
        match removed {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(failed(&path, e)),
        }
    }
    let empty = fs::read_dir(persist_dir).map(|mut entries| entries.next().is_none()).unwrap_or(false);
    if empty {
        fs::remove_dir(persist_dir).map_err(|e| failed(persist_dir, e))?;
    } else if persist_dir.exists() {
        debug!("Keeping {}: it holds other files", persist_dir.display());
    }
    Ok(())
}

#[async_trait]
impl IndexBackend for LanceIndexStore {
    fn exists(&self, persist_dir: &Path) -> bool {
        persist_dir.is_dir() && persist_dir.join(MANIFEST_FILE).is_file()
    }

    fn remove(&self, persist_dir: &Path) -> Result<()> {
        remove_index(persist_dir)
    }

    async fn build(
        &self,
        corpus: Corpus,
        embedder: Arc<dyn Embedder>,
        persist_dir: &Path,
    ) -> Result<Arc<dyn IndexHandle>> {
        check_dir(persist_dir)?;
        check_foreign(persist_dir)?;
        remove_index(persist_dir)?;
        fs::create_dir_all(persist_dir)
            .map_err(|e| Error::Persistence(format!("cannot create {}: {e}", persist_dir.display())))?;

        let manifest = match writer::write_index(&corpus, embedder.as_ref(), persist_dir).await {
            Ok(manifest) => manifest,
            Err(e) => {
                if let Err(cleanup) = remove_index(persist_dir) {
                    warn!("{cleanup}");
                }
                return Err(e);
            }
        };

        let table = open_chunk_table(&open_db(persist_dir).await?).await?;
        Ok(Arc::new(LanceIndex::new(table, embedder, manifest.chunk_count)))
    }

    async fn load(&self, persist_dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Arc<dyn IndexHandle>> {
        check_dir(persist_dir)?;
        let manifest = Manifest::read(persist_dir)?;
        if manifest.embedder_id != embedder.id() || manifest.dim != embedder.dim() {
            return Err(Error::Persistence(format!(
                "index at {} was built with {} ({} dims), current embedder is {} ({} dims)",
                persist_dir.display(),
                manifest.embedder_id,
                manifest.dim,
                embedder.id(),
                embedder.dim()
            )));
        }

        let table = open_chunk_table(&open_db(persist_dir).await?).await?;
        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        if rows != manifest.chunk_count {
            return Err(Error::Persistence(format!(
                "index at {} holds {rows} rows, manifest expects {}",
                persist_dir.display(),
                manifest.chunk_count
            )));
        }
        info!("Loaded {} chunks from {}", rows, persist_dir.display());
        Ok(Arc::new(LanceIndex::new(table, embedder, rows)))
    }
}
