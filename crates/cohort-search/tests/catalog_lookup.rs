use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cohort_core::{AttrName, Attribute, CriteriaNode, Domain, Operator};
use cohort_search::{CatalogError, CachedCatalog, CriteriaCatalog};
use tokio_test::block_on;

/// Tiny in-memory catalog of condition codes.
struct ConditionCatalog {
    searches: AtomicUsize,
}

#[async_trait]
impl CriteriaCatalog for ConditionCatalog {
    async fn search_criteria(
        &self,
        domain: Domain,
        criteria_type: &str,
        search_term: Option<&str>,
    ) -> Result<Vec<CriteriaNode>, CatalogError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let all = [
            (201826, "E11", "Type 2 diabetes mellitus"),
            (201254, "E10", "Type 1 diabetes mellitus"),
            (317009, "J45", "Asthma"),
        ];
        let term = search_term.map(str::to_lowercase);
        Ok(all
            .iter()
            .filter(|(_, _, name)| {
                term.as_deref()
                    .is_none_or(|t| name.to_lowercase().contains(t))
            })
            .map(|(concept_id, code, name)| {
                CriteriaNode::new(*concept_id, domain, criteria_type, *name)
                    .with_concept_id(*concept_id)
                    .with_code(*code)
            })
            .collect())
    }

    async fn criteria_attributes(&self, concept_id: i64) -> Result<Vec<Attribute>, CatalogError> {
        match concept_id {
            3004410 => Ok(vec![
                Attribute::unset(AttrName::Num).with_bounds(0.0, 1000.0),
                Attribute::new(AttrName::Cat, Operator::In, &[]).with_concept_id(45878583),
            ]),
            other => Err(CatalogError::ConceptNotFound(other)),
        }
    }
}

#[test]
fn cached_catalog_serves_repeat_searches_from_memory() {
    let source = Arc::new(ConditionCatalog {
        searches: AtomicUsize::new(0),
    });
    let catalog = CachedCatalog::new(source.clone(), 100);

    let diabetes = block_on(catalog.search_criteria(Domain::Condition, "ICD10CM", Some("diabetes")))
        .expect("search");
    assert_eq!(diabetes.len(), 2);
    assert_eq!(diabetes[0].code.as_deref(), Some("E11"));

    let again = block_on(catalog.search_criteria(Domain::Condition, "ICD10CM", Some("diabetes")))
        .expect("cached search");
    assert_eq!(again, diabetes);
    assert_eq!(source.searches.load(Ordering::SeqCst), 1);

    let all = block_on(catalog.search_criteria(Domain::Condition, "ICD10CM", Some("   ")))
        .expect("blank term lists everything");
    assert_eq!(all.len(), 3);
    assert_eq!(source.searches.load(Ordering::SeqCst), 2);
}

#[test]
fn attribute_lookup_errors_surface_user_message() {
    let catalog = CachedCatalog::new(
        Arc::new(ConditionCatalog {
            searches: AtomicUsize::new(0),
        }),
        100,
    );
    let attrs = block_on(catalog.criteria_attributes(3004410)).expect("attributes");
    assert_eq!(attrs.len(), 2);
    assert_eq!(attrs[0].max, Some(1000.0));

    let err = block_on(catalog.criteria_attributes(1)).unwrap_err();
    assert_eq!(err, CatalogError::ConceptNotFound(1));
    assert!(err.user_message().starts_with("Sorry, the request cannot be completed"));
    assert_eq!(catalog.cache_stats().attribute_entries, 1);
}
