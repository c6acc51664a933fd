//! Cohort criteria model shared by the search engine and the builder session.

pub mod criteria;
pub mod definition;
pub mod domain;
pub mod error;
pub mod group;
pub mod id;
pub mod item;
pub mod modifier;
pub mod request;
pub mod validation;

pub use criteria::{Arity, AttrName, Attribute, CriteriaNode, Operator};
pub use definition::{CohortDefinition, DefinitionGroup, DefinitionItem, SearchParameter};
pub use domain::{Domain, Role};
pub use error::{CoreError, ErrorCategory, Result};
pub use group::{GroupStatus, SearchGroup, TemporalMention, TemporalTime};
pub use id::{IdAllocator, GROUP_PREFIX, ITEM_PREFIX};
pub use item::{ItemStatus, SearchItem, TemporalSide};
pub use modifier::{Modifier, ModifierType};
pub use request::SearchRequest;
pub use validation::ValidationIssue;
