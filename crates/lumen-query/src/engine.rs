use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::debug;

use lumen_core::traits::{Generator, IndexHandle};
use lumen_core::types::{Generation, RetrievedChunk, StreamItem};
use lumen_core::{Error, Result};

use crate::prompt::build_prompt;

/// Fragments as they arrive, then one `Completed` with the whole text.
pub type AnswerStream = BoxStream<'static, Result<StreamItem>>;

/// Retrieval-augmented generation over a ready index.
#[derive(Clone)]
pub struct QueryEngine {
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(generator: Arc<dyn Generator>, top_k: usize) -> Self {
        Self { generator, top_k: top_k.max(1) }
    }

    /// Top-k chunks for `text`. Index read failures surface as `Retrieval`;
    /// anything else (e.g. the query embedding call) as `Generation`.
    pub async fn retrieve(&self, index: &dyn IndexHandle, text: &str) -> Result<Vec<RetrievedChunk>> {
        index.similar(text, self.top_k).await.map_err(|e| match e {
            Error::Retrieval(_) => e,
            other => Error::Generation(other.to_string()),
        })
    }

    /// Callers must not pass an empty `text`.
    pub async fn query(&self, index: &dyn IndexHandle, text: &str) -> Result<AnswerStream> {
        let context = self.retrieve(index, text).await?;
        debug!("Retrieved {} chunks for query", context.len());
        let prompt = build_prompt(text, &context);

        let fragments = self.generator.stream(&prompt).await.map_err(as_generation)?;
        let stream = stream::unfold(Some((fragments, String::new())), |state| async move {
            let (mut fragments, mut text) = state?;
            match fragments.next().await {
                Some(Ok(fragment)) => {
                    text.push_str(&fragment);
                    Some((Ok(StreamItem::Token(fragment)), Some((fragments, text))))
                }
                Some(Err(e)) => Some((Err(as_generation(e)), None)),
                None => Some((Ok(StreamItem::Completed(Generation { text })), None)),
            }
        });
        Ok(stream.boxed())
    }
}

fn as_generation(e: Error) -> Error {
    match e {
        Error::Generation(_) => e,
        other => Error::Generation(other.to_string()),
    }
}
