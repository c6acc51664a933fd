//! One cohort edit session.
//!
//! The session owns the search store and everything hanging off it: the
//! count engine, soft-delete timers, the cached criteria catalog and the id
//! allocator. Every edit goes through [`BuilderSession::edit`], which
//! dispatches the mutation to the store and hands the resulting refresh to
//! the engine.

use crate::config::BuilderConfig;
use crate::error::{BuilderError, Result};
use cohort_core::validation::{
    attribute_issues, group_count_eligible, modifier_issues, request_saveable, temporal_error,
    temporal_issues,
};
use cohort_core::{
    CohortDefinition, CoreError, GROUP_PREFIX, ITEM_PREFIX, IdAllocator, ItemStatus, Role,
    SearchItem, SearchRequest, ValidationIssue,
};
use cohort_search::{
    CachedCatalog, CountEngine, CountSnapshot, CountState, CriteriaCatalog, EngineConfig,
    GroupCommand, Mutation, ParticipantCounter, RemovalScheduler, SearchStore,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

pub struct BuilderSession {
    store: Arc<SearchStore>,
    engine: CountEngine,
    removals: RemovalScheduler,
    catalog: CachedCatalog,
    ids: Mutex<IdAllocator>,
    /// Definition as last loaded or saved; `None` for a new cohort.
    saved: Mutex<Option<CohortDefinition>>,
}

impl std::fmt::Debug for BuilderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuilderSession")
            .field("engine", &self.engine)
            .field("removals", &self.removals)
            .field("catalog", &self.catalog)
            .finish()
    }
}

impl BuilderSession {
    pub fn new(
        config: &BuilderConfig,
        counter: Arc<dyn ParticipantCounter>,
        catalog: Arc<dyn CriteriaCatalog>,
    ) -> Self {
        let store = Arc::new(SearchStore::default());
        let engine = CountEngine::new(
            Arc::clone(&store),
            counter,
            EngineConfig {
                coalesce_delay: config.engine.coalesce_delay(),
            },
        );
        Self {
            store,
            engine,
            removals: RemovalScheduler::new(config.removal.grace_period()),
            catalog: CachedCatalog::new(catalog, config.catalog.cache_capacity),
            ids: Mutex::new(IdAllocator::new()),
            saved: Mutex::new(None),
        }
    }

    /// Load a saved cohort definition and refresh all of its counts.
    pub fn hydrate(&self, json: &str) -> Result<()> {
        let request = CohortDefinition::from_json(json)?.into_request()?;
        self.reset();
        {
            let mut ids = self.ids.lock();
            for (_, group) in request.all_groups() {
                ids.reserve(group.id.as_str());
                for item in &group.items {
                    ids.reserve(item.id.as_str());
                }
            }
        }
        let published = self.store.publish(request);
        *self.saved.lock() = Some(CohortDefinition::from_request(&published));
        info!(
            includes = published.includes.len(),
            excludes = published.excludes.len(),
            "hydrated cohort"
        );
        self.engine.init_existing();
        Ok(())
    }

    /// Discard the request, its counts and pending removals.
    pub fn reset(&self) {
        self.removals.cancel_all();
        self.engine.reset();
        self.store.publish(SearchRequest::new());
        self.ids.lock().clear();
        *self.saved.lock() = None;
        debug!("builder session reset");
    }

    /// Apply one mutation. Returns whether the request changed.
    pub fn edit(&self, mutation: Mutation) -> bool {
        let before = self.store.get_value();
        let outcome = self.store.dispatch(&mutation);
        self.engine.schedule(&outcome.refresh);
        outcome.changed_from(&before)
    }

    /// Append an empty group and return its id.
    pub fn add_group(&self, role: Role) -> String {
        let group_id = self.ids.lock().generate(GROUP_PREFIX);
        self.edit(Mutation::AddGroup {
            role,
            group_id: group_id.clone(),
        });
        group_id
    }

    /// A fresh id for an item about to be added.
    pub fn new_item_id(&self) -> String {
        self.ids.lock().generate(ITEM_PREFIX)
    }

    pub fn add_item(&self, role: Role, group_id: &str, item: SearchItem) -> bool {
        self.ids.lock().reserve(item.id.as_str());
        self.edit(Mutation::AddItem {
            role,
            group_id: group_id.to_string(),
            item,
        })
    }

    pub fn upsert_item(&self, role: Role, group_id: &str, item: SearchItem) -> bool {
        self.ids.lock().reserve(item.id.as_str());
        self.edit(Mutation::UpsertItem {
            role,
            group_id: group_id.to_string(),
            item,
        })
    }

    pub fn update_item_status(
        &self,
        role: Role,
        group_id: &str,
        item_id: &str,
        status: ItemStatus,
    ) -> bool {
        self.edit(Mutation::UpdateItemStatus {
            role,
            group_id: group_id.to_string(),
            item_id: item_id.to_string(),
            status,
        })
    }

    pub fn remove_item(&self, role: Role, group_id: &str, item_id: &str) -> bool {
        self.edit(Mutation::RemoveItem {
            role,
            group_id: group_id.to_string(),
            item_id: item_id.to_string(),
        })
    }

    pub fn remove_group(&self, role: Role, group_id: &str) -> bool {
        self.removals.cancel(group_id);
        self.edit(Mutation::RemoveGroup {
            role,
            group_id: group_id.to_string(),
        })
    }

    /// Mark a group pending and remove it for good once the grace period
    /// ends, unless [`undo_remove_group`](Self::undo_remove_group) runs first.
    pub fn soft_remove_group(&self, role: Role, group_id: &str) -> bool {
        let changed = self.edit(Mutation::SoftRemoveGroup {
            role,
            group_id: group_id.to_string(),
        });
        if changed {
            let store = Arc::clone(&self.store);
            let engine = self.engine.clone();
            let expire = Mutation::ExpireGroup {
                role,
                group_id: group_id.to_string(),
            };
            self.removals.schedule(group_id, move || {
                let outcome = store.dispatch(&expire);
                engine.schedule(&outcome.refresh);
                info!(group_id = expire.group_id(), "removed group");
            });
        }
        changed
    }

    pub fn undo_remove_group(&self, role: Role, group_id: &str) -> bool {
        self.removals.cancel(group_id);
        self.edit(Mutation::UndoRemoveGroup {
            role,
            group_id: group_id.to_string(),
        })
    }

    pub fn hide_group(&self, role: Role, group_id: &str) -> bool {
        self.edit(Mutation::HideGroup {
            role,
            group_id: group_id.to_string(),
        })
    }

    pub fn enable_group(&self, role: Role, group_id: &str) -> bool {
        self.edit(Mutation::EnableGroup {
            role,
            group_id: group_id.to_string(),
        })
    }

    pub fn set_group_property(&self, role: Role, group_id: &str, command: GroupCommand) -> bool {
        self.edit(Mutation::SetGroupProperty {
            role,
            group_id: group_id.to_string(),
            command,
        })
    }

    pub fn rename_group(&self, role: Role, group_id: &str, name: &str) -> bool {
        self.edit(Mutation::RenameGroup {
            role,
            group_id: group_id.to_string(),
            name: name.to_string(),
        })
    }

    /// Every validation problem of a group, temporal issues first.
    pub fn group_issues(&self, role: Role, group_id: &str) -> Result<Vec<ValidationIssue>> {
        let request = self.store.get_value();
        let group = request
            .find_group(role, group_id)
            .ok_or_else(|| CoreError::group_not_found(role.to_string(), group_id))?;
        let mut issues = temporal_issues(group);
        for item in group.active_items() {
            issues.extend(item.search_parameters.iter().flat_map(attribute_issues));
            issues.extend(modifier_issues(item));
        }
        Ok(issues)
    }

    pub fn can_save(&self) -> bool {
        request_saveable(&self.store.get_value())
    }

    /// Whether the current request differs from what was loaded or saved.
    pub fn is_dirty(&self) -> bool {
        let current = CohortDefinition::from_request(&self.store.get_value());
        match &*self.saved.lock() {
            Some(saved) => *saved != current,
            None => current != CohortDefinition::default(),
        }
    }

    /// Serialize the definition to persist and remember it as saved.
    pub fn save(&self) -> Result<String> {
        let request = self.store.get_value();
        if !request.has_active_items() {
            return Err(BuilderError::not_saveable("no active criteria"));
        }
        let blocked = request
            .all_groups()
            .filter(|(_, g)| g.is_active() && g.has_active_items());
        for (role, group) in blocked {
            if temporal_error(group) {
                return Err(BuilderError::not_saveable(format!(
                    "{role} group {} has an incomplete temporal setup",
                    group.id
                )));
            }
            if !group_count_eligible(group) {
                return Err(BuilderError::not_saveable(format!(
                    "{role} group {} has invalid criteria",
                    group.id
                )));
            }
        }
        let definition = CohortDefinition::from_request(&request);
        let json = definition.to_json()?;
        *self.saved.lock() = Some(definition);
        info!("saved cohort definition");
        Ok(json)
    }

    pub fn request(&self) -> Arc<SearchRequest> {
        self.store.get_value()
    }

    /// Observe request snapshots. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<SearchRequest>> {
        self.store.subscribe()
    }

    pub fn counts(&self) -> CountSnapshot {
        self.engine.snapshot()
    }

    pub fn subscribe_counts(&self) -> watch::Receiver<CountSnapshot> {
        self.engine.subscribe()
    }

    pub fn group_count(&self, group_id: &str) -> Option<CountState> {
        self.engine.group_state(group_id)
    }

    pub fn total_count(&self) -> CountState {
        self.engine.total_state()
    }

    pub fn is_removal_pending(&self, group_id: &str) -> bool {
        self.removals.is_scheduled(group_id)
    }

    pub fn engine(&self) -> &CountEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &CachedCatalog {
        &self.catalog
    }
}

impl Drop for BuilderSession {
    fn drop(&mut self) {
        self.removals.cancel_all();
    }
}
