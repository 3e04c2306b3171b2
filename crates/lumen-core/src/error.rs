use std::path::PathBuf;

use thiserror::Error;

/// Failure kinds shared by every stage of the pipeline.
///
/// `UnsupportedFormat` and `Extraction` are per-file and never abort an
/// ingestion run; everything else surfaces to the owning lifecycle
/// controller, which turns it into an `ERROR` state.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unsupported format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Extraction failed for {}: {reason}", .path.display())]
    Extraction { path: PathBuf, reason: String },

    #[error("No supported content found under {}", .0.display())]
    EmptyCorpus(PathBuf),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn extraction(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Extraction { path: path.into(), reason: reason.to_string() }
    }

    /// Per-file failures are absorbed by the corpus walk.
    #[must_use]
    pub fn is_fatal_for_ingestion(&self) -> bool {
        !matches!(self, Self::UnsupportedFormat(_) | Self::Extraction { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_file_kinds_are_not_fatal() {
        assert!(!Error::UnsupportedFormat(PathBuf::from("a.jpeg")).is_fatal_for_ingestion());
        assert!(!Error::extraction("a.pdf", "bad xref").is_fatal_for_ingestion());
        assert!(Error::PathNotFound(PathBuf::from("gone.txt")).is_fatal_for_ingestion());
        assert!(Error::EmptyCorpus(PathBuf::from("/data")).is_fatal_for_ingestion());
    }

    #[test]
    fn extraction_message_names_the_file() {
        let err = Error::extraction("/data/report.docx", "missing word/document.xml");
        assert_eq!(
            err.to_string(),
            "Extraction failed for /data/report.docx: missing word/document.xml"
        );
    }
}
