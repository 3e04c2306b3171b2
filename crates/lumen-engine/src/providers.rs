use std::sync::Arc;

use lumen_core::config::Settings;
use lumen_core::traits::{Embedder, Generator};
use lumen_core::Result;
use lumen_query::OpenAiChat;

/// Resolves the external capabilities for a configuration.
pub trait Providers: Send + Sync {
    fn embedder(&self, settings: &Settings) -> Result<Arc<dyn Embedder>>;
    fn generator(&self, settings: &Settings) -> Result<Arc<dyn Generator>>;
}

/// OpenAI embeddings and chat, or the hashing embedder when
/// `APP_USE_FAKE_EMBEDDINGS` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiProviders;

impl Providers for OpenAiProviders {
    fn embedder(&self, settings: &Settings) -> Result<Arc<dyn Embedder>> {
        lumen_embed::resolve_embedder(settings)
    }

    fn generator(&self, settings: &Settings) -> Result<Arc<dyn Generator>> {
        Ok(Arc::new(OpenAiChat::new(&settings.openai)?))
    }
}
