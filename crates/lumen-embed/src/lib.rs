//! Embedding capabilities: the OpenAI-compatible HTTP embedder used in
//! production and a deterministic hashing embedder for offline runs.

mod openai;

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use lumen_core::config::Settings;
use lumen_core::traits::Embedder;
use lumen_core::Result;
use tracing::info;
use twox_hash::XxHash64;

pub use openai::OpenAiEmbedder;

pub const FAKE_DIM: usize = 256;

/// Bag-of-words hashing into `dim` buckets, L2-normalised. Same text, same
/// vector; shared words pull vectors together.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    /// `dim` is clamped to at least one bucket.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("fake:{dim}") }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() {
                continue;
            }
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            v[idx] += 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Default for FakeEmbedder {
    fn default() -> Self {
        Self::new(FAKE_DIM)
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// `APP_USE_FAKE_EMBEDDINGS=1|true` swaps in the hashing embedder.
#[must_use]
pub fn fake_requested() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// The single embedding capability for `settings`. Fails with
/// `MissingCredential` when the OpenAI key is absent.
pub fn resolve_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    if fake_requested() {
        info!("Using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::default()));
    }
    Ok(Arc::new(OpenAiEmbedder::new(&settings.openai)?))
}
