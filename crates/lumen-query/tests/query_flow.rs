use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;

use lumen_core::traits::{FragmentStream, Generator, IndexHandle};
use lumen_core::types::{RetrievedChunk, StreamItem};
use lumen_core::{Error, Result};
use lumen_query::{QueryEngine, ScriptedGenerator, StreamSession};

struct StubIndex {
    broken: bool,
}

#[async_trait]
impl IndexHandle for StubIndex {
    fn len(&self) -> usize {
        1
    }

    async fn similar(&self, _query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if self.broken {
            return Err(Error::Retrieval("lance file truncated".into()));
        }
        Ok(vec![RetrievedChunk { source_path: "/docs/a.txt".into(), text: "Paris is in France.".into(), score: 0.9 }]
            .into_iter()
            .take(k)
            .collect())
    }
}

#[derive(Default)]
struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn stream(&self, prompt: &str) -> Result<FragmentStream> {
        self.prompts.lock().push(prompt.to_string());
        Ok(futures::stream::iter(vec![Ok("ok".to_string())]).boxed())
    }
}

#[tokio::test]
async fn tokens_then_one_completion() {
    let tokens = ["Paris", " is", " the", " capital", ".", "S", "OURCES", ":", " a.txt"];
    let engine = QueryEngine::new(Arc::new(ScriptedGenerator::new(tokens)), 4);
    let index = StubIndex { broken: false };

    let items: Vec<StreamItem> = engine
        .query(&index, "What is the capital of France?")
        .await
        .unwrap()
        .map(|i| i.unwrap())
        .collect()
        .await;
    assert_eq!(items.len(), tokens.len() + 1);

    let mut session = StreamSession::default();
    let mut partials = Vec::new();
    let mut finals = Vec::new();
    for item in &items {
        match item {
            StreamItem::Token(t) => partials.extend(session.on_token(t)),
            StreamItem::Completed(generation) => finals.push(session.finish(generation)),
        }
    }
    assert_eq!(partials.last().map(String::as_str), Some("Paris is the capital."));
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0].sources, vec!["a.txt"]);
}

#[tokio::test]
async fn prompt_carries_retrieved_context() {
    let generator = Arc::new(RecordingGenerator::default());
    let engine = QueryEngine::new(generator.clone(), 2);
    let index = StubIndex { broken: false };

    let _ = engine.query(&index, "where is Paris").await.unwrap().collect::<Vec<_>>().await;
    let prompts = generator.prompts.lock();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("source: /docs/a.txt"));
    assert!(prompts[0].contains("Question: where is Paris"));
}

#[tokio::test]
async fn broken_index_is_a_retrieval_error() {
    let engine = QueryEngine::new(Arc::new(ScriptedGenerator::new(["never"])), 4);
    let err = engine.query(&StubIndex { broken: true }, "anything").await.err().unwrap();
    assert!(matches!(err, Error::Retrieval(_)));
}

#[tokio::test]
async fn generator_failure_ends_stream_with_generation_error() {
    let generator = ScriptedGenerator::new(["partial"]).failing_after("connection reset");
    let engine = QueryEngine::new(Arc::new(generator), 4);

    let items: Vec<Result<StreamItem>> =
        engine.query(&StubIndex { broken: false }, "q").await.unwrap().collect().await;
    assert_eq!(items.len(), 2);
    assert!(matches!(items[0], Ok(StreamItem::Token(_))));
    assert!(matches!(items[1], Err(Error::Generation(_))));
}
