//! Single-writer store holding the current search request.

use crate::mutation::{Mutation, Outcome};
use cohort_core::SearchRequest;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

/// Holds the latest request snapshot and publishes every change.
///
/// Mutations are serialized by a writer lock, so two dispatches never race
/// on the same base snapshot.
#[derive(Debug)]
pub struct SearchStore {
    tx: watch::Sender<Arc<SearchRequest>>,
    writer: Mutex<()>,
}

impl Default for SearchStore {
    fn default() -> Self {
        Self::new(SearchRequest::new())
    }
}

impl SearchStore {
    pub fn new(initial: SearchRequest) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self {
            tx,
            writer: Mutex::new(()),
        }
    }

    /// Current snapshot.
    pub fn get_value(&self) -> Arc<SearchRequest> {
        Arc::clone(&self.tx.borrow())
    }

    /// Apply a mutation to the current snapshot and publish the result if
    /// it changed anything.
    pub fn dispatch(&self, mutation: &Mutation) -> Outcome {
        let _guard = self.writer.lock();
        let current = self.get_value();
        let outcome = mutation.apply(&current);
        if outcome.changed_from(&current) {
            trace!(group_id = mutation.group_id(), "publishing request");
            self.tx.send_replace(Arc::clone(&outcome.request));
        }
        outcome
    }

    /// Replace the whole request (hydration and reset).
    pub fn publish(&self, request: SearchRequest) -> Arc<SearchRequest> {
        let _guard = self.writer.lock();
        let request = Arc::new(request);
        self.tx.send_replace(Arc::clone(&request));
        request
    }

    /// Receive every published snapshot. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<SearchRequest>> {
        self.tx.subscribe()
    }
}
