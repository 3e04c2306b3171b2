use tokio::sync::mpsc;
use tracing::debug;

use lumen_core::types::{IndexingState, QueryState};
use lumen_query::FinalAnswer;

/// Notifications for the presentation layer, delivered in publish order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    IndexingStateChanged(IndexingState),
    QueryStateChanged(QueryState),
    PartialAnswer(String),
    FinalAnswer(FinalAnswer),
}

#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<CoreEvent>,
}

impl EventSink {
    pub fn emit(&self, event: CoreEvent) {
        if self.tx.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}

pub fn channel() -> (EventSink, mpsc::UnboundedReceiver<CoreEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, rx)
}
