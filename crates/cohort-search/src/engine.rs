//! Count Refresh Engine.
//!
//! Count-affecting mutations schedule a refresh of the edited group and of
//! the total. Scheduling is deferred by a short coalescing window so the
//! mutations of one gesture produce a single refresh per target. Every
//! issued call captures a generation; a response is applied only while its
//! generation is still the latest for that target, so overlapping edits
//! always settle on the result of the last one.
//!
//! Count state lives in a side map keyed by group id and survives request
//! replacement. Observers receive [`CountSnapshot`]s through a watch channel.

use crate::error::CountError;
use crate::mutation::{Mutation, Refresh};
use crate::store::SearchStore;
use async_trait::async_trait;
use cohort_core::validation::{definition_errors, group_count_eligible};
use cohort_core::{GroupStatus, SearchGroup, SearchRequest};
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Default coalescing window between a mutation and the refresh it triggers.
pub const DEFAULT_COALESCE_DELAY: Duration = Duration::from_millis(10);

/// Remote participant count procedure.
#[async_trait]
pub trait ParticipantCounter: Send + Sync {
    async fn count_participants(&self, request: &SearchRequest) -> Result<u64, CountError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountStatus {
    #[default]
    Idle,
    Loading,
    Error,
}

/// Count state of one target. The last resolved count is kept through
/// loading and error states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountState {
    pub status: CountStatus,
    pub count: Option<u64>,
}

impl CountState {
    pub fn is_loading(&self) -> bool {
        self.status == CountStatus::Loading
    }

    pub fn is_error(&self) -> bool {
        self.status == CountStatus::Error
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountSnapshot {
    pub groups: IndexMap<String, CountState>,
    pub total: CountState,
}

impl CountSnapshot {
    pub fn group(&self, group_id: &str) -> Option<&CountState> {
        self.groups.get(group_id)
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub coalesce_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            coalesce_delay: DEFAULT_COALESCE_DELAY,
        }
    }
}

#[derive(Debug, Default)]
struct EngineState {
    pending_groups: IndexSet<String>,
    pending_total: bool,
    flush_scheduled: bool,
    /// Shared across all targets so generations never repeat, even after reset.
    next_generation: u64,
    group_generations: HashMap<String, u64>,
    total_generation: u64,
    /// Projection of the last total call that did not fail.
    last_total: Option<SearchRequest>,
}

impl EngineState {
    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

struct Inner {
    store: Arc<SearchStore>,
    counter: Arc<dyn ParticipantCounter>,
    config: EngineConfig,
    state: Mutex<EngineState>,
    snapshot: watch::Sender<CountSnapshot>,
}

/// Cloneable handle to the count engine. Methods that schedule work must be
/// called from within a Tokio runtime.
#[derive(Clone)]
pub struct CountEngine {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CountEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountEngine")
            .field("config", &self.inner.config)
            .field("state", &*self.inner.state.lock())
            .finish()
    }
}

fn countable(group: &SearchGroup) -> bool {
    group.status != GroupStatus::Pending && group.has_active_items() && group_count_eligible(group)
}

impl CountEngine {
    pub fn new(
        store: Arc<SearchStore>,
        counter: Arc<dyn ParticipantCounter>,
        config: EngineConfig,
    ) -> Self {
        let (snapshot, _rx) = watch::channel(CountSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                store,
                counter,
                config,
                state: Mutex::new(EngineState::default()),
                snapshot,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Schedule the count work a mutation asked for.
    pub fn schedule(&self, refresh: &Refresh) {
        match refresh {
            Refresh::None => return,
            Refresh::Total => self.inner.state.lock().pending_total = true,
            Refresh::Group { group_id, .. } => {
                let mut state = self.inner.state.lock();
                state.pending_groups.insert(group_id.clone());
                state.pending_total = true;
            }
            Refresh::Forget { group_id } => {
                self.inner.forget_group(group_id);
                self.inner.state.lock().pending_total = true;
            }
        }
        self.inner.ensure_flush();
    }

    /// Refresh every group of a freshly hydrated request. The groups share
    /// one total call.
    pub fn init_existing(&self) {
        let request = self.inner.store.get_value();
        {
            let mut state = self.inner.state.lock();
            state
                .pending_groups
                .extend(request.all_groups().map(|(_, group)| group.id.clone()));
            state.pending_total = true;
        }
        info!(
            includes = request.includes.len(),
            excludes = request.excludes.len(),
            "refreshing counts for existing cohort"
        );
        self.inner.ensure_flush();
    }

    /// Issue all pending refreshes now instead of waiting for the window.
    pub fn flush(&self) {
        self.inner.flush();
    }

    /// Drop a group's count state. Late responses for it are discarded.
    pub fn forget_group(&self, group_id: &str) {
        self.inner.forget_group(group_id);
    }

    /// Discard all count state and invalidate every call in flight.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        let next_generation = state.next_generation;
        *state = EngineState {
            next_generation,
            ..EngineState::default()
        };
        self.inner.snapshot.send_replace(CountSnapshot::default());
        debug!("count engine reset");
    }

    pub fn snapshot(&self) -> CountSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn group_state(&self, group_id: &str) -> Option<CountState> {
        self.inner.snapshot.borrow().groups.get(group_id).copied()
    }

    pub fn total_state(&self) -> CountState {
        self.inner.snapshot.borrow().total
    }

    /// Observe count transitions. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<CountSnapshot> {
        self.inner.snapshot.subscribe()
    }
}

impl Inner {
    fn ensure_flush(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.flush_scheduled || (state.pending_groups.is_empty() && !state.pending_total) {
                return;
            }
            state.flush_scheduled = true;
        }
        let inner = Arc::clone(self);
        let delay = self.config.coalesce_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.flush();
        });
    }

    fn flush(self: &Arc<Self>) {
        let request = self.store.get_value();
        let (groups, total) = {
            let mut state = self.state.lock();
            state.flush_scheduled = false;
            (
                std::mem::take(&mut state.pending_groups),
                std::mem::take(&mut state.pending_total),
            )
        };
        if groups.is_empty() && !total {
            return;
        }
        debug!(groups = groups.len(), total, "flushing count refresh");
        for group_id in &groups {
            self.refresh_group(&request, group_id);
        }
        if total {
            self.refresh_total(&request);
        }
    }

    fn refresh_group(self: &Arc<Self>, request: &SearchRequest, group_id: &str) {
        let Some((role, idx)) = request.locate_group(group_id) else {
            self.forget_group(group_id);
            return;
        };
        let group = &request.groups(role)[idx];

        let mut state = self.state.lock();
        let generation = state.bump();
        state
            .group_generations
            .insert(group_id.to_string(), generation);

        if !countable(group) {
            self.update_group(group_id, |s| s.status = CountStatus::Idle);
            debug!(group_id, "group is not countable, keeping last count");
            return;
        }

        self.update_group(group_id, |s| s.status = CountStatus::Loading);
        drop(state);

        let projection = SearchRequest::group_projection(role, group);
        let inner = Arc::clone(self);
        let group_id = group_id.to_string();
        tokio::spawn(async move {
            let result = inner.counter.count_participants(&projection).await;
            inner.resolve_group(&group_id, generation, result);
        });
    }

    fn resolve_group(&self, group_id: &str, generation: u64, result: Result<u64, CountError>) {
        let resolved = {
            let state = self.state.lock();
            if state.group_generations.get(group_id) != Some(&generation) {
                debug!(group_id, generation, "discarding stale group count");
                return;
            }
            match result {
                Ok(count) => {
                    self.update_group(group_id, |s| {
                        *s = CountState {
                            status: CountStatus::Idle,
                            count: Some(count),
                        }
                    });
                    Some(count)
                }
                Err(err) => {
                    warn!(group_id, error = %err, "group count failed");
                    self.update_group(group_id, |s| s.status = CountStatus::Error);
                    None
                }
            }
        };

        if let Some(count) = resolved {
            let request = self.store.get_value();
            if let Some((role, _)) = request.locate_group(group_id) {
                self.store.dispatch(&Mutation::RecordGroupCount {
                    role,
                    group_id: group_id.to_string(),
                    count: Some(count),
                });
            }
        }
    }

    fn refresh_total(self: &Arc<Self>, request: &SearchRequest) {
        let mut state = self.state.lock();
        if definition_errors(request) {
            let generation = state.bump();
            state.total_generation = generation;
            state.last_total = None;
            self.update_total(|t| t.status = CountStatus::Idle);
            debug!("definition has errors, keeping last total");
            return;
        }

        let projection = request.count_projection();
        if state.last_total.as_ref() == Some(&projection) {
            debug!("total projection unchanged");
            return;
        }
        let generation = state.bump();
        state.total_generation = generation;
        state.last_total = Some(projection.clone());

        if projection.includes.is_empty() {
            self.update_total(|t| {
                *t = CountState {
                    status: CountStatus::Idle,
                    count: Some(0),
                }
            });
            return;
        }

        self.update_total(|t| t.status = CountStatus::Loading);
        drop(state);

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = inner.counter.count_participants(&projection).await;
            inner.resolve_total(generation, result);
        });
    }

    fn resolve_total(&self, generation: u64, result: Result<u64, CountError>) {
        let mut state = self.state.lock();
        if state.total_generation != generation {
            debug!(generation, "discarding stale total count");
            return;
        }
        match result {
            Ok(count) => self.update_total(|t| {
                *t = CountState {
                    status: CountStatus::Idle,
                    count: Some(count),
                }
            }),
            Err(err) => {
                warn!(error = %err, "total count failed");
                state.last_total = None;
                self.update_total(|t| t.status = CountStatus::Error);
            }
        }
    }

    fn forget_group(&self, group_id: &str) {
        let mut state = self.state.lock();
        state.group_generations.remove(group_id);
        state.pending_groups.shift_remove(group_id);
        self.snapshot
            .send_if_modified(|snap| snap.groups.shift_remove(group_id).is_some());
    }

    fn update_group(&self, group_id: &str, f: impl FnOnce(&mut CountState)) {
        self.snapshot.send_if_modified(|snap| {
            let entry = snap.groups.entry(group_id.to_string()).or_default();
            let before = *entry;
            f(entry);
            *entry != before
        });
    }

    fn update_total(&self, f: impl FnOnce(&mut CountState)) {
        self.snapshot.send_if_modified(|snap| {
            let before = snap.total;
            f(&mut snap.total);
            snap.total != before
        });
    }
}
