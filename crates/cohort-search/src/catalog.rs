//! Criteria catalog adapter.
//!
//! The catalog is an external read-only service, so results for identical
//! arguments can be memoised. [`CachedCatalog`] keeps successful lookups in a
//! bounded in-memory cache; failures are never cached.

use crate::error::CatalogError;
use async_trait::async_trait;
use cohort_core::{Attribute, CriteriaNode, Domain};
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Default number of cached entries per lookup kind.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

#[async_trait]
pub trait CriteriaCatalog: Send + Sync {
    /// Criteria of a domain and type matching an optional search term.
    async fn search_criteria(
        &self,
        domain: Domain,
        criteria_type: &str,
        search_term: Option<&str>,
    ) -> Result<Vec<CriteriaNode>, CatalogError>;

    /// Attributes that can constrain a concept (value ranges, categories).
    async fn criteria_attributes(&self, concept_id: i64) -> Result<Vec<Attribute>, CatalogError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SearchKey {
    domain: Domain,
    criteria_type: String,
    search_term: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub search_entries: usize,
    pub attribute_entries: usize,
}

/// Memoising wrapper around a [`CriteriaCatalog`].
pub struct CachedCatalog {
    inner: Arc<dyn CriteriaCatalog>,
    capacity: usize,
    searches: DashMap<SearchKey, Arc<Vec<CriteriaNode>>>,
    attributes: DashMap<i64, Arc<Vec<Attribute>>>,
}

impl std::fmt::Debug for CachedCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCatalog")
            .field("capacity", &self.capacity)
            .field("stats", &self.cache_stats())
            .finish()
    }
}

/// Insert while keeping the map within `capacity`, evicting an arbitrary
/// entry when full. A capacity of zero disables caching.
fn bounded_insert<K, V>(map: &DashMap<K, V>, capacity: usize, key: K, value: V)
where
    K: Eq + Hash + Clone,
{
    if capacity == 0 {
        return;
    }
    while map.len() >= capacity {
        let victim = map.iter().next().map(|entry| entry.key().clone());
        match victim {
            Some(victim) => {
                map.remove(&victim);
            }
            None => break,
        }
    }
    map.insert(key, value);
}

impl CachedCatalog {
    pub fn new(inner: Arc<dyn CriteriaCatalog>, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            searches: DashMap::new(),
            attributes: DashMap::new(),
        }
    }

    pub fn clear_cache(&self) {
        self.searches.clear();
        self.attributes.clear();
        tracing::debug!("Cleared criteria catalog caches");
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            search_entries: self.searches.len(),
            attribute_entries: self.attributes.len(),
        }
    }
}

#[async_trait]
impl CriteriaCatalog for CachedCatalog {
    async fn search_criteria(
        &self,
        domain: Domain,
        criteria_type: &str,
        search_term: Option<&str>,
    ) -> Result<Vec<CriteriaNode>, CatalogError> {
        let search_term = search_term.map(str::trim).filter(|t| !t.is_empty());
        let key = SearchKey {
            domain,
            criteria_type: criteria_type.to_string(),
            search_term: search_term.map(str::to_string),
        };
        if let Some(cached) = self.searches.get(&key) {
            tracing::debug!(%domain, criteria_type, "Cache hit for criteria search");
            return Ok(Vec::clone(cached.value()));
        }

        let nodes = self
            .inner
            .search_criteria(domain, criteria_type, search_term)
            .await
            .inspect_err(|e| tracing::warn!(%domain, criteria_type, error = %e, "Criteria search failed"))?;
        bounded_insert(&self.searches, self.capacity, key, Arc::new(nodes.clone()));
        Ok(nodes)
    }

    async fn criteria_attributes(&self, concept_id: i64) -> Result<Vec<Attribute>, CatalogError> {
        if let Some(cached) = self.attributes.get(&concept_id) {
            tracing::debug!(concept_id, "Cache hit for criteria attributes");
            return Ok(Vec::clone(cached.value()));
        }

        let attributes = self
            .inner
            .criteria_attributes(concept_id)
            .await
            .inspect_err(|e| tracing::warn!(concept_id, error = %e, "Attribute lookup failed"))?;
        bounded_insert(
            &self.attributes,
            self.capacity,
            concept_id,
            Arc::new(attributes.clone()),
        );
        Ok(attributes)
    }
}
