//! Owner of the indexing state and the single shared index handle.
//!
//! Builds and loads run on a spawned task. Every reset bumps an epoch; a
//! task that finishes under an older epoch is stale, so its result is
//! dropped and whatever it persisted is removed. A start requested while a
//! stale task is still running waits for it and is launched afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use lumen_core::config::Settings;
use lumen_core::corpus::CorpusBuilder;
use lumen_core::extract::ExtractOptions;
use lumen_core::traits::{IndexBackend, IndexHandle};
use lumen_core::types::{IllegalTransition, IndexingState};
use lumen_core::{Error, Result};

use crate::events::{CoreEvent, EventSink};
use crate::providers::Providers;

struct IndexCell {
    state: IndexingState,
    handle: Option<Arc<dyn IndexHandle>>,
    epoch: u64,
    in_flight: bool,
    pending: Option<Settings>,
}

pub struct IndexLifecycle {
    cell: Mutex<IndexCell>,
    backend: Arc<dyn IndexBackend>,
    providers: Arc<dyn Providers>,
    events: EventSink,
}

impl IndexLifecycle {
    pub fn new(backend: Arc<dyn IndexBackend>, providers: Arc<dyn Providers>, events: EventSink) -> Self {
        Self {
            cell: Mutex::new(IndexCell {
                state: IndexingState::NotLoaded,
                handle: None,
                epoch: 0,
                in_flight: false,
                pending: None,
            }),
            backend,
            providers,
            events,
        }
    }

    pub fn state(&self) -> IndexingState {
        self.cell.lock().state
    }

    /// The shared handle and the configuration epoch it belongs to, only
    /// while `LOADED`.
    pub fn loaded(&self) -> Option<(Arc<dyn IndexHandle>, u64)> {
        let cell = self.cell.lock();
        match cell.state {
            IndexingState::Loaded => cell.handle.clone().map(|handle| (handle, cell.epoch)),
            _ => None,
        }
    }

    /// `NOT_LOADED -> LOADING`, then load or build in the background.
    /// Must be called from within a Tokio runtime.
    pub fn start(self: &Arc<Self>, settings: Settings) -> std::result::Result<(), IllegalTransition<IndexingState>> {
        let mut cell = self.cell.lock();
        if cell.in_flight && cell.state == IndexingState::NotLoaded {
            info!("Superseded index task still running; start deferred");
            cell.pending = Some(settings);
            return Ok(());
        }
        self.set_state(&mut cell, IndexingState::Loading)?;
        cell.in_flight = true;
        let epoch = cell.epoch;
        drop(cell);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let dir = settings.index.persist_dir.clone();
            let result = this.open(&settings).await;
            this.finish(epoch, dir, result);
        });
        Ok(())
    }

    /// Configuration changed: forget the handle, land in `NOT_LOADED` and
    /// delete the persisted index at `persist_dir`.
    pub fn reset(&self, persist_dir: Option<&Path>) {
        let mut cell = self.cell.lock();
        cell.epoch += 1;
        cell.pending = None;
        if cell.state == IndexingState::NotLoaded {
            return;
        }
        cell.handle = None;
        if let Err(e) = self.set_state(&mut cell, IndexingState::NotLoaded) {
            warn!("{e}");
        }
        drop(cell);

        if let Some(dir) = persist_dir {
            match self.backend.remove(dir) {
                Ok(()) => info!("Removed index at {}", dir.display()),
                Err(e) => warn!("{e}"),
            }
        }
    }

    /// A query found the index of `epoch` unreadable: `LOADED -> ERROR`.
    /// Ignored once the configuration has moved on to a newer epoch.
    pub fn mark_failed(&self, epoch: u64) {
        let mut cell = self.cell.lock();
        if cell.epoch != epoch {
            info!("Ignoring retrieval failure of a superseded index");
            return;
        }
        if cell.state != IndexingState::Loaded {
            return;
        }
        cell.handle = None;
        if let Err(e) = self.set_state(&mut cell, IndexingState::Error) {
            warn!("{e}");
        }
    }

    fn set_state(
        &self,
        cell: &mut IndexCell,
        next: IndexingState,
    ) -> std::result::Result<(), IllegalTransition<IndexingState>> {
        if !cell.state.can_transition_to(next) {
            return Err(IllegalTransition { from: cell.state, to: next });
        }
        info!("Indexing state: {} -> {}", cell.state, next);
        cell.state = next;
        self.events.emit(CoreEvent::IndexingStateChanged(next));
        Ok(())
    }

    async fn open(&self, settings: &Settings) -> Result<Arc<dyn IndexHandle>> {
        let dir = settings
            .index
            .persist_dir
            .clone()
            .ok_or_else(|| Error::InvalidPath("no persistence directory configured".to_string()))?;
        let embedder = self.providers.embedder(settings)?;

        if self.backend.exists(&dir) {
            info!("Loading index from {}", dir.display());
            return self.backend.load(&dir, embedder).await;
        }

        info!("Building index from {} folder(s)", settings.index.search_dirs.len());
        let options = ExtractOptions::from(&settings.index);
        let roots = settings.index.search_dirs.clone();
        let corpus = tokio::task::spawn_blocking(move || CorpusBuilder::new(options).build_all(&roots))
            .await
            .map_err(|e| Error::Persistence(format!("ingestion task failed: {e}")))??;
        self.backend.build(corpus, embedder, &dir).await
    }

    fn finish(self: &Arc<Self>, epoch: u64, dir: Option<PathBuf>, result: Result<Arc<dyn IndexHandle>>) {
        let mut cell = self.cell.lock();
        cell.in_flight = false;

        if epoch != cell.epoch {
            let pending = cell.pending.take();
            drop(cell);
            info!("Discarding result of superseded index task");
            if let Some(dir) = dir {
                if let Err(e) = self.backend.remove(&dir) {
                    warn!("{e}");
                }
            }
            if let Some(settings) = pending {
                if let Err(e) = self.start(settings) {
                    warn!("{e}");
                }
            }
            return;
        }

        let next = match result {
            Ok(handle) => {
                info!("Index ready with {} chunks", handle.len());
                cell.handle = Some(handle);
                IndexingState::Loaded
            }
            Err(e) => {
                error!("Index load/build failed: {e}");
                IndexingState::Error
            }
        };
        if let Err(e) = self.set_state(&mut cell, next) {
            warn!("{e}");
        }
    }
}
