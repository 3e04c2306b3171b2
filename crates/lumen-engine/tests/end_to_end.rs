use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use lumen_core::config::{RenderMode, Settings};
use lumen_core::traits::{Embedder, Generator};
use lumen_core::types::IndexingState;
use lumen_core::Result;
use lumen_embed::FakeEmbedder;
use lumen_engine::{CoreEvent, Engine, Providers};
use lumen_query::ScriptedGenerator;
use lumen_vector::LanceIndexStore;

struct OfflineProviders;

impl Providers for OfflineProviders {
    fn embedder(&self, _settings: &Settings) -> Result<Arc<dyn Embedder>> {
        Ok(Arc::new(FakeEmbedder::new(64)))
    }

    fn generator(&self, _settings: &Settings) -> Result<Arc<dyn Generator>> {
        Ok(Arc::new(ScriptedGenerator::new([
            "Cells fade\n",
            "when hot.",
            " SOURCES: ",
            "/docs/battery.md",
        ])))
    }
}

async fn wait_for_index(rx: &mut tokio::sync::mpsc::UnboundedReceiver<CoreEvent>) -> IndexingState {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(30), rx.recv()).await.unwrap().unwrap();
        if let CoreEvent::IndexingStateChanged(state @ (IndexingState::Loaded | IndexingState::Error)) = event {
            return state;
        }
    }
}

#[tokio::test]
async fn build_query_and_reload_on_lancedb() {
    let docs = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    fs::write(docs.path().join("battery.md"), "Lithium cells fade when hot.").unwrap();
    fs::write(docs.path().join("paris.txt"), "Paris is the capital of France.").unwrap();

    let mut settings = Settings::default();
    settings.index.search_dirs = vec![docs.path().to_path_buf()];
    settings.index.persist_dir = Some(state.path().join("index"));
    settings.openai.api_key = Some("sk-offline".into());
    settings.query.render = RenderMode::Html;

    let (engine, mut rx) = Engine::new(Arc::new(LanceIndexStore::new()), Arc::new(OfflineProviders));
    engine.configure(settings.clone());
    assert_eq!(wait_for_index(&mut rx).await, IndexingState::Loaded);

    let hits = engine.retrieve("lithium cells").await.unwrap();
    assert!(hits[0].source_path.ends_with("battery.md"));

    engine.start_query("Why do cells fade?").unwrap().await.unwrap();
    let mut last_partial = None;
    let mut final_answer = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            CoreEvent::PartialAnswer(p) => last_partial = Some(p),
            CoreEvent::FinalAnswer(f) => final_answer = Some(f),
            _ => {}
        }
    }
    assert_eq!(last_partial.as_deref(), Some("Cells fade<br>when hot. "));
    let final_answer = final_answer.unwrap();
    assert_eq!(final_answer.answer, "Cells fade\nwhen hot.");
    assert_eq!(final_answer.sources, vec!["/docs/battery.md"]);
    assert!(final_answer.rendered.contains("<a href=\"file:///docs/battery.md\">"));

    // A second engine over the same settings reloads the persisted index.
    let (reloaded, mut rx2) = Engine::new(Arc::new(LanceIndexStore::new()), Arc::new(OfflineProviders));
    fs::remove_file(docs.path().join("paris.txt")).unwrap();
    reloaded.configure(settings.clone());
    assert_eq!(wait_for_index(&mut rx2).await, IndexingState::Loaded);
    assert_eq!(reloaded.retrieve("capital of France").await.unwrap().len(), 2);

    // Changing the folders drops the persisted index.
    let mut moved = settings;
    moved.index.search_dirs.push(state.path().to_path_buf());
    moved.openai.api_key = None;
    reloaded.configure(moved);
    assert_eq!(reloaded.indexing_state(), IndexingState::NotLoaded);
    assert!(!state.path().join("index").exists());
}
