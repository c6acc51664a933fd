//! Editing and counting cohort searches.
//!
//! - [`mutation`]: pure edits of a search request
//! - [`store`]: single-writer store publishing request snapshots
//! - [`engine`]: participant count refresh with last-edit-wins semantics
//! - [`scheduler`]: deferred removal of soft-deleted groups
//! - [`catalog`]: criteria catalog adapter with a result cache

pub mod catalog;
pub mod engine;
pub mod error;
pub mod mutation;
pub mod scheduler;
pub mod store;

pub use catalog::{CacheStats, CachedCatalog, CriteriaCatalog};
pub use engine::{
    CountEngine, CountSnapshot, CountState, CountStatus, EngineConfig, ParticipantCounter,
};
pub use error::{CatalogError, CountError};
pub use mutation::{GroupCommand, Mutation, Outcome, Refresh};
pub use scheduler::RemovalScheduler;
pub use store::SearchStore;
