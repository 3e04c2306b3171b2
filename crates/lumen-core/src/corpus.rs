use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::extract::{ExtractOptions, Extractor};
use crate::types::{Corpus, DocumentChunk};

/// Walks directory trees and gathers the chunks of every supported file.
#[derive(Debug, Clone, Default)]
pub struct CorpusBuilder {
    extractor: Extractor,
}

impl CorpusBuilder {
    #[must_use]
    pub fn new(options: ExtractOptions) -> Self {
        Self { extractor: Extractor::new(options) }
    }

    /// Fails with `EmptyCorpus` when nothing under `root` yields a chunk.
    pub fn build(&self, root: &Path) -> Result<Corpus> {
        self.build_all(&[root.to_path_buf()])
    }

    /// Concatenation of the corpora of every root, in the given order. A
    /// file reachable from several roots is extracted once, under the
    /// first root that reaches it.
    pub fn build_all(&self, roots: &[PathBuf]) -> Result<Corpus> {
        let mut corpus = Corpus::new();
        let mut seen = HashSet::new();
        for root in roots {
            self.walk(root, &mut seen, &mut corpus)?;
        }
        if corpus.is_empty() {
            let root = roots.first().cloned().unwrap_or_default();
            return Err(Error::EmptyCorpus(root));
        }
        info!("Processed {} files into {} chunks", corpus.file_count(), corpus.len());
        Ok(corpus)
    }

    fn walk(&self, root: &Path, seen: &mut HashSet<PathBuf>, corpus: &mut Corpus) -> Result<()> {
        if !root.is_dir() {
            return Err(Error::InvalidPath(format!("{} is not a directory", root.display())));
        }

        let entries = WalkDir::new(root).follow_links(false).sort_by_file_name();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
            if !seen.insert(key) {
                debug!("Already visited {}", path.display());
                continue;
            }
            match guarded(path, || self.extractor.extract_or_skip(path)) {
                Ok(chunks) => {
                    debug!("{}: {} chunks", path.display(), chunks.len());
                    corpus.push_file(chunks);
                }
                Err(e) => warn!("{e}"),
            }
        }
        Ok(())
    }
}

/// Runs one file's extraction, turning a panic inside a format parser into
/// an `Extraction` error for that file.
fn guarded<F>(path: &Path, extract: F) -> Result<Vec<DocumentChunk>>
where
    F: FnOnce() -> Result<Vec<DocumentChunk>>,
{
    panic::catch_unwind(AssertUnwindSafe(extract)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "parser panicked".to_string());
        Err(Error::extraction(path, format!("parser panicked: {reason}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_panic_becomes_extraction_error() {
        let result = guarded(Path::new("/data/odd.xlsx"), || panic!("index out of bounds"));
        let err = result.unwrap_err();
        assert!(!err.is_fatal_for_ingestion());
        assert!(err.to_string().contains("index out of bounds"), "{err}");
    }

    #[test]
    fn guarded_passes_results_through() {
        let chunks = guarded(Path::new("a.txt"), || Ok(vec![DocumentChunk::new("a.txt", "x")]));
        assert_eq!(chunks.unwrap().len(), 1);
    }
}
