//! In-process engine: the command surface (`configure`, `start_query`) and
//! the ordered event stream a presentation layer consumes.
//!
//! All background work runs on Tokio tasks; state changes and answer
//! updates arrive on the receiver returned by [`Engine::new`].

pub mod events;
pub mod index_lifecycle;
pub mod providers;
pub mod query_lifecycle;

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use lumen_core::config::{RenderMode, Settings};
use lumen_core::traits::{IndexBackend, IndexHandle};
use lumen_core::types::{IndexingState, QueryState, RetrievedChunk, StreamItem};
use lumen_core::{Error, Result};
use lumen_query::{QueryEngine, StreamSession};
use lumen_vector::LanceIndexStore;

pub use events::{CoreEvent, EventSink};
pub use index_lifecycle::IndexLifecycle;
pub use providers::{OpenAiProviders, Providers};
pub use query_lifecycle::{QueryLifecycle, QueryRejected};
pub use lumen_query::FinalAnswer;

pub struct Engine {
    index: Arc<IndexLifecycle>,
    query: Arc<QueryLifecycle>,
    settings: Mutex<Option<Settings>>,
    answering: Mutex<Option<(QueryEngine, RenderMode)>>,
    providers: Arc<dyn Providers>,
    events: EventSink,
}

impl Engine {
    pub fn new(
        backend: Arc<dyn IndexBackend>,
        providers: Arc<dyn Providers>,
    ) -> (Self, UnboundedReceiver<CoreEvent>) {
        let (events, rx) = events::channel();
        let engine = Self {
            index: Arc::new(IndexLifecycle::new(backend, Arc::clone(&providers), events.clone())),
            query: Arc::new(QueryLifecycle::new(events.clone())),
            settings: Mutex::new(None),
            answering: Mutex::new(None),
            providers,
            events,
        };
        (engine, rx)
    }

    /// LanceDB store with OpenAI embeddings and chat.
    pub fn with_defaults() -> (Self, UnboundedReceiver<CoreEvent>) {
        Self::new(Arc::new(LanceIndexStore::new()), Arc::new(OpenAiProviders))
    }

    pub fn indexing_state(&self) -> IndexingState {
        self.index.state()
    }

    pub fn query_state(&self) -> QueryState {
        self.query.state()
    }

    /// Apply a configuration. A change to anything the index depends on
    /// resets both lifecycles and deletes the old persisted index; a
    /// complete configuration then starts a load or build in the
    /// background. Must be called from within a Tokio runtime.
    pub fn configure(&self, settings: Settings) {
        let mut current = self.settings.lock();
        let identity_changed = match current.as_ref() {
            Some(old) => old.index_identity_changed(&settings),
            None => true,
        };
        if identity_changed {
            if let Some(old) = current.as_ref() {
                info!("Index configuration changed");
                self.index.reset(old.index.persist_dir.as_deref());
                self.query.reset();
            }
        }

        *self.answering.lock() = match self.providers.generator(&settings) {
            Ok(generator) => Some((QueryEngine::new(generator, settings.query.top_k), settings.query.render)),
            Err(e) => {
                debug!("No answer generator: {e}");
                None
            }
        };

        let start = settings.is_complete() && self.index.state() == IndexingState::NotLoaded;
        *current = Some(settings.clone());
        drop(current);

        if start {
            if let Err(e) = self.index.start(settings) {
                debug!("{e}");
            }
        } else if !settings.is_complete() {
            info!("Configuration incomplete; index not started");
        }
    }

    /// Validate and launch a query. Output arrives as events; the returned
    /// handle completes once the query is terminal.
    pub fn start_query(&self, text: &str) -> std::result::Result<JoinHandle<()>, QueryRejected> {
        let text = text.trim();
        if text.is_empty() {
            return Err(QueryRejected::EmptyQuery);
        }
        let Some((handle, epoch)) = self.index.loaded() else {
            return Err(QueryRejected::IndexNotReady(self.index.state()));
        };
        let Some((engine, render)) = self.answering.lock().clone() else {
            return Err(QueryRejected::NotConfigured);
        };
        self.query.try_begin()?;

        let index = Arc::clone(&self.index);
        let query = Arc::clone(&self.query);
        let events = self.events.clone();
        let text = text.to_string();
        Ok(tokio::spawn(async move {
            let mut session = StreamSession::new(render);
            match answer(&engine, handle.as_ref(), &text, &mut session, &events).await {
                Ok(()) => query.finish(true),
                Err(e) => {
                    session.reset();
                    error!("Query failed: {e}");
                    if matches!(e, Error::Retrieval(_)) {
                        index.mark_failed(epoch);
                    }
                    query.finish(false);
                }
            }
        }))
    }

    /// Top-k chunks for `text` without generating an answer.
    pub async fn retrieve(&self, text: &str) -> Result<Vec<RetrievedChunk>> {
        let (handle, epoch) = self
            .index
            .loaded()
            .ok_or_else(|| Error::Retrieval(format!("index is {}", self.index.state())))?;
        let top_k = self.settings.lock().as_ref().map_or(4, |s| s.query.top_k);
        let result = handle.similar(text, top_k).await;
        if let Err(Error::Retrieval(_)) = &result {
            self.index.mark_failed(epoch);
        }
        result
    }
}

async fn answer(
    engine: &QueryEngine,
    index: &dyn IndexHandle,
    text: &str,
    session: &mut StreamSession,
    events: &EventSink,
) -> Result<()> {
    let mut stream = engine.query(index, text).await?;
    while let Some(item) = stream.next().await {
        match item? {
            StreamItem::Token(token) => {
                if let Some(partial) = session.on_token(&token) {
                    events.emit(CoreEvent::PartialAnswer(partial));
                }
            }
            StreamItem::Completed(generation) => {
                events.emit(CoreEvent::FinalAnswer(session.finish(&generation)));
            }
        }
    }
    Ok(())
}
