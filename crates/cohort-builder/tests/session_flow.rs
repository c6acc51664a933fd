use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cohort_builder::{BuilderConfig, BuilderError, BuilderSession};
use cohort_core::{
    AttrName, Attribute, CriteriaNode, Domain, GroupStatus, Operator, Role, SearchItem,
    SearchRequest, TemporalSide, TemporalTime, ValidationIssue,
};
use cohort_search::{
    CatalogError, CountError, CountStatus, CriteriaCatalog, GroupCommand, ParticipantCounter,
};
use parking_lot::Mutex;

/// 1500 participants for any includes, 1450 once an excludes group applies,
/// 50 for an excludes group counted on its own.
#[derive(Default)]
struct StubCounter {
    calls: Mutex<Vec<SearchRequest>>,
}

impl StubCounter {
    fn calls(&self) -> Vec<SearchRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ParticipantCounter for StubCounter {
    async fn count_participants(&self, request: &SearchRequest) -> Result<u64, CountError> {
        self.calls.lock().push(request.clone());
        Ok(match (request.includes.is_empty(), request.excludes.is_empty()) {
            (false, false) => 1450,
            (false, true) => 1500,
            _ => 50,
        })
    }
}

#[derive(Default)]
struct StubCatalog {
    searches: AtomicUsize,
}

#[async_trait]
impl CriteriaCatalog for StubCatalog {
    async fn search_criteria(
        &self,
        domain: Domain,
        criteria_type: &str,
        _search_term: Option<&str>,
    ) -> Result<Vec<CriteriaNode>, CatalogError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(vec![
            CriteriaNode::new(201826, domain, criteria_type, "Type 2 diabetes mellitus")
                .with_concept_id(201826),
        ])
    }

    async fn criteria_attributes(&self, _concept_id: i64) -> Result<Vec<Attribute>, CatalogError> {
        Ok(Vec::new())
    }
}

fn session_with(counter: Arc<StubCounter>) -> (BuilderSession, Arc<StubCatalog>) {
    let catalog = Arc::new(StubCatalog::default());
    let session = BuilderSession::new(&BuilderConfig::default(), counter, catalog.clone());
    (session, catalog)
}

fn item(id: String, domain: Domain, concept_id: i64) -> SearchItem {
    SearchItem::new(id, domain).with_parameter(
        CriteriaNode::new(concept_id, domain, "SNOMED", "criteria").with_concept_id(concept_id),
    )
}

fn add_group_with_item(session: &BuilderSession, role: Role, concept_id: i64) -> String {
    let group_id = session.add_group(role);
    let item = item(session.new_item_id(), Domain::Condition, concept_id);
    assert!(session.add_item(role, &group_id, item));
    group_id
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test(start_paused = true)]
async fn engine_relays_counter_results() {
    let counter = Arc::new(StubCounter::default());
    let (session, _) = session_with(counter.clone());

    let g = add_group_with_item(&session, Role::Includes, 201826);
    settle().await;
    assert_eq!(session.total_count().count, Some(1500));
    assert_eq!(session.group_count(&g).unwrap().count, Some(1500));
    let stored = session.request();
    assert_eq!(stored.find_group(Role::Includes, &g).unwrap().count, Some(1500));

    let x = add_group_with_item(&session, Role::Excludes, 1503297);
    settle().await;
    let total = session.total_count();
    assert_eq!(total.count, Some(1450));
    assert_eq!(total.status, CountStatus::Idle);
    assert_eq!(session.group_count(&x).unwrap().count, Some(50));
}

#[tokio::test(start_paused = true)]
async fn soft_removed_group_can_be_restored_until_grace_period_ends() {
    let counter = Arc::new(StubCounter::default());
    let (session, _) = session_with(counter.clone());
    let g1 = add_group_with_item(&session, Role::Includes, 1);
    let g2 = add_group_with_item(&session, Role::Includes, 2);
    settle().await;

    assert!(session.soft_remove_group(Role::Includes, &g2));
    assert!(session.is_removal_pending(&g2));
    let pending = session.request();
    assert_eq!(
        pending.find_group(Role::Includes, &g2).unwrap().status,
        GroupStatus::Pending
    );
    settle().await;
    let last_total = counter.calls().pop().expect("total call");
    assert_eq!(last_total.includes.len(), 1);
    assert_eq!(last_total.includes[0].id, g1);

    assert!(session.undo_remove_group(Role::Includes, &g2));
    assert!(!session.is_removal_pending(&g2));
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(session.request().find_group(Role::Includes, &g2).is_some());

    assert!(session.soft_remove_group(Role::Includes, &g2));
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(session.request().find_group(Role::Includes, &g2).is_none());
    assert!(!session.is_removal_pending(&g2));
    assert!(session.group_count(&g2).is_none());
    assert!(session.group_count(&g1).is_some());
}

#[tokio::test(start_paused = true)]
async fn hydrating_existing_cohort_issues_one_total_call() {
    let (author, _) = session_with(Arc::new(StubCounter::default()));
    for concept_id in [1, 2, 3] {
        add_group_with_item(&author, Role::Includes, concept_id);
    }
    add_group_with_item(&author, Role::Excludes, 4);
    let json = author.save().expect("saveable cohort");
    assert!(!author.is_dirty());

    let counter = Arc::new(StubCounter::default());
    let (session, _) = session_with(counter.clone());
    session.hydrate(&json).expect("hydrate");
    assert!(!session.is_dirty());
    settle().await;

    let calls = counter.calls();
    let totals = calls
        .iter()
        .filter(|c| c.includes.len() + c.excludes.len() == 4)
        .count();
    assert_eq!(totals, 1);
    assert_eq!(calls.len(), 5);
    assert_eq!(session.total_count().count, Some(1450));
}

#[tokio::test(start_paused = true)]
async fn unsaved_changes_are_detected() {
    let (session, _) = session_with(Arc::new(StubCounter::default()));
    assert!(!session.is_dirty());

    let g = add_group_with_item(&session, Role::Includes, 1);
    assert!(session.is_dirty());
    session.save().expect("save");
    assert!(!session.is_dirty());

    // resolved counts are not edits
    settle().await;
    assert!(!session.is_dirty());

    assert!(session.rename_group(Role::Includes, &g, "Diabetics"));
    assert!(session.is_dirty());
    session.save().expect("save renamed");
    assert!(!session.is_dirty());

    assert!(session.hide_group(Role::Includes, &g));
    assert!(session.is_dirty());
    assert!(session.enable_group(Role::Includes, &g));
    assert!(!session.is_dirty());

    session.reset();
    assert!(!session.is_dirty());
    assert!(session.request().is_empty());
}

#[tokio::test(start_paused = true)]
async fn incomplete_temporal_group_blocks_save() {
    let (session, _) = session_with(Arc::new(StubCounter::default()));
    let err = session.save().unwrap_err();
    assert!(matches!(err, BuilderError::NotSaveable(_)));

    let g = add_group_with_item(&session, Role::Includes, 1);
    assert!(session.set_group_property(Role::Includes, &g, GroupCommand::SetTemporal(true)));
    assert!(!session.can_save());
    let issues = session.group_issues(Role::Includes, &g).expect("group exists");
    assert_eq!(
        issues,
        vec![ValidationIssue::TemporalSideEmpty {
            side: TemporalSide::Secondary
        }]
    );

    let second = item(session.new_item_id(), Domain::Drug, 2).on_side(TemporalSide::Secondary);
    assert!(session.add_item(Role::Includes, &g, second));
    assert!(session.set_group_property(
        Role::Includes,
        &g,
        GroupCommand::SetTime(TemporalTime::WithinXDaysOf)
    ));
    assert!(!session.can_save());
    assert!(session.set_group_property(Role::Includes, &g, GroupCommand::SetTimeValue(Some(30))));
    assert!(session.can_save());
    assert!(session.group_issues(Role::Includes, &g).expect("group").is_empty());

    assert!(session.group_issues(Role::Excludes, &g).is_err());
}

#[tokio::test]
async fn catalog_lookups_are_cached_per_session() {
    let (session, catalog) = session_with(Arc::new(StubCounter::default()));
    let first = session
        .catalog()
        .search_criteria(Domain::Condition, "ICD10CM", Some("diabetes"))
        .await
        .expect("search");
    let second = session
        .catalog()
        .search_criteria(Domain::Condition, "ICD10CM", Some("diabetes"))
        .await
        .expect("cached search");
    assert_eq!(first, second);
    assert_eq!(catalog.searches.load(Ordering::SeqCst), 1);
    assert_eq!(session.catalog().cache_stats().search_entries, 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_attribute_blocks_counting_and_save() {
    let counter = Arc::new(StubCounter::default());
    let (session, _) = session_with(counter.clone());
    let g = session.add_group(Role::Includes);
    let lab_id = session.new_item_id();
    let lab = |operands: &[&str]| {
        SearchItem::new(lab_id.clone(), Domain::Measurement).with_parameter(
            CriteriaNode::new(3004410, Domain::Measurement, "LOINC", "Glucose")
                .with_concept_id(3004410)
                .with_attributes(vec![Attribute::new(AttrName::Num, Operator::Between, operands)]),
        )
    };
    assert!(session.add_item(Role::Includes, &g, lab(&["30"])));
    settle().await;
    assert!(counter.calls().is_empty());

    assert!(!session.can_save());
    match session.save() {
        Err(BuilderError::NotSaveable(reason)) => assert!(reason.contains("invalid criteria")),
        other => panic!("expected NotSaveable, got {other:?}"),
    }
    assert!(!session.group_issues(Role::Includes, &g).expect("group").is_empty());

    assert!(session.upsert_item(Role::Includes, &g, lab(&["30", "90"])));
    settle().await;
    assert_eq!(counter.calls().len(), 2);
    assert!(session.can_save());
    session.save().expect("valid cohort saves");
}
