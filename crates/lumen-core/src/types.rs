//! Domain types shared by the ingestion, index and query crates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unit of indexable text tied to one source file.
///
/// - `source_path`: absolute path of the file the text came from, kept
///   verbatim so answers can cite it
/// - `text`: non-empty payload that gets embedded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub source_path: String,
    pub text: String,
}

impl DocumentChunk {
    pub fn new(source_path: impl Into<String>, text: impl Into<String>) -> Self {
        Self { source_path: source_path.into(), text: text.into() }
    }
}

/// All chunks produced by one ingestion run, in walk order.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    chunks: Vec<DocumentChunk>,
    files: usize,
}

impl Corpus {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append the chunks of one file. Files yielding nothing are not counted.
    pub fn push_file(&mut self, chunks: Vec<DocumentChunk>) {
        if chunks.is_empty() { return; }
        self.files += 1;
        self.chunks.extend(chunks);
    }

    #[must_use]
    pub fn len(&self) -> usize { self.chunks.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    /// Number of files that contributed at least one chunk.
    #[must_use]
    pub fn file_count(&self) -> usize { self.files }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentChunk> { self.chunks.iter() }
}

/// A chunk returned by a similarity lookup. Higher `score` is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub source_path: String,
    pub text: String,
    pub score: f32,
}

/// Readiness of the single shared index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexingState {
    NotLoaded,
    Loading,
    Loaded,
    Error,
}

impl IndexingState {
    /// Forward edges plus the configuration-change reset. `Loaded -> Error`
    /// is the retrieval-failure edge: a query found the index unusable.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use IndexingState::{Error, Loaded, Loading, NotLoaded};
        matches!(
            (self, next),
            (NotLoaded, Loading)
                | (Loading, Loaded | Error)
                | (Loaded, Error)
                | (Loading | Loaded | Error, NotLoaded)
        )
    }
}

impl fmt::Display for IndexingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotLoaded => "NOT_LOADED",
            Self::Loading => "LOADING",
            Self::Loaded => "LOADED",
            Self::Error => "ERROR",
        })
    }
}

/// Whether a query is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Standby,
    Querying,
    Error,
}

impl QueryState {
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use QueryState::{Error, Querying, Standby};
        matches!((self, next), (Standby, Querying) | (Querying, Standby | Error) | (Error, Standby))
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standby => "STANDBY",
            Self::Querying => "QUERYING",
            Self::Error => "ERROR",
        })
    }
}

/// A rejected state change. Returned, never panicked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition {from} -> {to}")]
pub struct IllegalTransition<S: fmt::Display + fmt::Debug> {
    pub from: S,
    pub to: S,
}

/// Complete output of one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
}

/// One item of a query's output stream: fragments as they arrive, then
/// exactly one `Completed` carrying the aggregated answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Token(String),
    Completed(Generation),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexing_state_edges() {
        use IndexingState::*;
        assert!(NotLoaded.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Loaded));
        assert!(Loading.can_transition_to(Error));
        assert!(Loaded.can_transition_to(NotLoaded));
        assert!(Error.can_transition_to(NotLoaded));
        assert!(!NotLoaded.can_transition_to(Loaded));
        assert!(!Error.can_transition_to(Loaded));
        assert!(!Loaded.can_transition_to(Loading));
        assert!(!NotLoaded.can_transition_to(NotLoaded));
    }

    #[test]
    fn query_state_edges() {
        use QueryState::*;
        assert!(Standby.can_transition_to(Querying));
        assert!(Querying.can_transition_to(Standby));
        assert!(Querying.can_transition_to(Error));
        assert!(Error.can_transition_to(Standby));
        assert!(!Error.can_transition_to(Querying));
        assert!(!Querying.can_transition_to(Querying));
    }

    #[test]
    fn corpus_counts_only_contributing_files() {
        let mut corpus = Corpus::new();
        corpus.push_file(vec![DocumentChunk::new("/a.txt", "alpha"), DocumentChunk::new("/a.txt", "beta")]);
        corpus.push_file(Vec::new());
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.file_count(), 1);
    }
}
