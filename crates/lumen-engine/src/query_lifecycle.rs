use parking_lot::Mutex;
use tracing::{info, warn};

use lumen_core::types::{IllegalTransition, IndexingState, QueryState};

use crate::events::{CoreEvent, EventSink};

/// Why `start_query` did not start anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueryRejected {
    #[error("query is empty")]
    EmptyQuery,
    #[error("index is not ready ({0})")]
    IndexNotReady(IndexingState),
    #[error("a query is already running")]
    Busy,
    #[error("the previous query failed; change the configuration to reset")]
    Failed,
    #[error("no answer generator is configured")]
    NotConfigured,
}

/// Serializes queries: at most one is `QUERYING` at a time.
pub struct QueryLifecycle {
    state: Mutex<QueryState>,
    events: EventSink,
}

impl QueryLifecycle {
    pub fn new(events: EventSink) -> Self {
        Self { state: Mutex::new(QueryState::Standby), events }
    }

    pub fn state(&self) -> QueryState {
        *self.state.lock()
    }

    /// `STANDBY -> QUERYING`, or the reason it is not allowed.
    pub fn try_begin(&self) -> Result<(), QueryRejected> {
        let mut state = self.state.lock();
        match *state {
            QueryState::Standby => {
                self.set(&mut state, QueryState::Querying);
                Ok(())
            }
            QueryState::Querying => Err(QueryRejected::Busy),
            QueryState::Error => Err(QueryRejected::Failed),
        }
    }

    /// `QUERYING -> STANDBY` on success, `QUERYING -> ERROR` otherwise.
    pub fn finish(&self, succeeded: bool) {
        let mut state = self.state.lock();
        let next = if succeeded { QueryState::Standby } else { QueryState::Error };
        self.set(&mut state, next);
    }

    /// Configuration changed: `ERROR -> STANDBY`. Other states are left alone.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if *state == QueryState::Error {
            self.set(&mut state, QueryState::Standby);
        }
    }

    fn set(&self, state: &mut QueryState, next: QueryState) {
        if !state.can_transition_to(next) {
            warn!("{}", IllegalTransition { from: *state, to: next });
            return;
        }
        info!("Query state: {} -> {}", *state, next);
        *state = next;
        self.events.emit(CoreEvent::QueryStateChanged(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::channel;

    #[test]
    fn second_query_is_rejected_while_running() {
        let (sink, mut rx) = channel();
        let query = QueryLifecycle::new(sink);

        assert_eq!(query.try_begin(), Ok(()));
        assert_eq!(query.try_begin(), Err(QueryRejected::Busy));
        query.finish(true);
        assert_eq!(query.state(), QueryState::Standby);

        assert_eq!(rx.try_recv().ok(), Some(CoreEvent::QueryStateChanged(QueryState::Querying)));
        assert_eq!(rx.try_recv().ok(), Some(CoreEvent::QueryStateChanged(QueryState::Standby)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn failure_sticks_until_reset() {
        let (sink, _rx) = channel();
        let query = QueryLifecycle::new(sink);

        query.try_begin().unwrap();
        query.finish(false);
        assert_eq!(query.state(), QueryState::Error);
        assert_eq!(query.try_begin(), Err(QueryRejected::Failed));

        query.reset();
        assert_eq!(query.state(), QueryState::Standby);
        assert_eq!(query.try_begin(), Ok(()));
    }

    #[test]
    fn reset_leaves_running_query_alone() {
        let (sink, _rx) = channel();
        let query = QueryLifecycle::new(sink);
        query.try_begin().unwrap();
        query.reset();
        assert_eq!(query.state(), QueryState::Querying);
    }
}
