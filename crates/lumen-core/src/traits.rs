//! Capability seams for the external collaborators: the embedding model,
//! the vector index backend and the answer generator.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::{Corpus, RetrievedChunk};

/// Raw text fragments from a generation call, in arrival order.
pub type FragmentStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-ada-002`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| crate::Error::Embedding("empty embedding result".to_string()))
    }
}

/// A ready, queryable index. Read-only once handed out.
#[async_trait]
pub trait IndexHandle: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool { self.len() == 0 }

    /// Nearest chunks to `query`, closest first. Fails with
    /// `Error::Retrieval` when the persisted data cannot be read.
    async fn similar(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>>;
}

/// Owner of the persisted index: existence check, build, reload and removal.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    fn exists(&self, persist_dir: &Path) -> bool;

    /// Delete what `build` wrote under `persist_dir`, and nothing else.
    /// Removing an index that is not there succeeds.
    fn remove(&self, persist_dir: &Path) -> Result<()>;

    async fn build(
        &self,
        corpus: Corpus,
        embedder: Arc<dyn Embedder>,
        persist_dir: &Path,
    ) -> Result<Arc<dyn IndexHandle>>;

    async fn load(&self, persist_dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Arc<dyn IndexHandle>>;
}

/// Streaming answer generator (an LLM behind some transport).
#[async_trait]
pub trait Generator: Send + Sync {
    async fn stream(&self, prompt: &str) -> Result<FragmentStream>;
}
