//! Mutation API for search requests.
//!
//! Every edit is a [`Mutation`] applied to an immutable request snapshot.
//! Applying never touches its input: a changed request is returned as a new
//! `Arc`, and a no-op returns the very same `Arc` so callers can detect it
//! with [`Arc::ptr_eq`].

use cohort_core::{
    GroupStatus, ItemStatus, Role, SearchGroup, SearchItem, SearchRequest, TemporalMention,
    TemporalSide, TemporalTime,
};
use std::sync::Arc;
use tracing::debug;

/// Group property setters dispatched through [`Mutation::SetGroupProperty`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupCommand {
    SetTemporal(bool),
    SetMention(TemporalMention),
    SetTime(TemporalTime),
    SetTimeValue(Option<i64>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Append an empty group. The id comes from the session's allocator.
    AddGroup { role: Role, group_id: String },
    RemoveGroup { role: Role, group_id: String },
    SoftRemoveGroup { role: Role, group_id: String },
    UndoRemoveGroup { role: Role, group_id: String },
    /// Hard removal once the grace window of a soft remove ends.
    ExpireGroup { role: Role, group_id: String },
    HideGroup { role: Role, group_id: String },
    EnableGroup { role: Role, group_id: String },
    RenameGroup {
        role: Role,
        group_id: String,
        name: String,
    },
    AddItem {
        role: Role,
        group_id: String,
        item: SearchItem,
    },
    UpsertItem {
        role: Role,
        group_id: String,
        item: SearchItem,
    },
    UpdateItemStatus {
        role: Role,
        group_id: String,
        item_id: String,
        status: ItemStatus,
    },
    RemoveItem {
        role: Role,
        group_id: String,
        item_id: String,
    },
    SetGroupProperty {
        role: Role,
        group_id: String,
        command: GroupCommand,
    },
    RecordGroupCount {
        role: Role,
        group_id: String,
        count: Option<u64>,
    },
}

/// Count work a mutation calls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refresh {
    None,
    /// Only the total is affected (membership or visibility changed).
    Total,
    /// The group's own count and the total.
    Group { role: Role, group_id: String },
    /// The group is gone: drop its count state and refresh the total.
    Forget { group_id: String },
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub request: Arc<SearchRequest>,
    pub refresh: Refresh,
}

impl Outcome {
    fn unchanged(request: &Arc<SearchRequest>) -> Self {
        Self {
            request: Arc::clone(request),
            refresh: Refresh::None,
        }
    }

    /// Whether the mutation produced a new request.
    pub fn changed_from(&self, previous: &Arc<SearchRequest>) -> bool {
        !Arc::ptr_eq(&self.request, previous)
    }
}

impl Mutation {
    pub fn role(&self) -> Role {
        match self {
            Mutation::AddGroup { role, .. }
            | Mutation::RemoveGroup { role, .. }
            | Mutation::SoftRemoveGroup { role, .. }
            | Mutation::UndoRemoveGroup { role, .. }
            | Mutation::ExpireGroup { role, .. }
            | Mutation::HideGroup { role, .. }
            | Mutation::EnableGroup { role, .. }
            | Mutation::RenameGroup { role, .. }
            | Mutation::AddItem { role, .. }
            | Mutation::UpsertItem { role, .. }
            | Mutation::UpdateItemStatus { role, .. }
            | Mutation::RemoveItem { role, .. }
            | Mutation::SetGroupProperty { role, .. }
            | Mutation::RecordGroupCount { role, .. } => *role,
        }
    }

    pub fn group_id(&self) -> &str {
        match self {
            Mutation::AddGroup { group_id, .. }
            | Mutation::RemoveGroup { group_id, .. }
            | Mutation::SoftRemoveGroup { group_id, .. }
            | Mutation::UndoRemoveGroup { group_id, .. }
            | Mutation::ExpireGroup { group_id, .. }
            | Mutation::HideGroup { group_id, .. }
            | Mutation::EnableGroup { group_id, .. }
            | Mutation::RenameGroup { group_id, .. }
            | Mutation::AddItem { group_id, .. }
            | Mutation::UpsertItem { group_id, .. }
            | Mutation::UpdateItemStatus { group_id, .. }
            | Mutation::RemoveItem { group_id, .. }
            | Mutation::SetGroupProperty { group_id, .. }
            | Mutation::RecordGroupCount { group_id, .. } => group_id,
        }
    }

    /// Apply the mutation to a snapshot.
    pub fn apply(&self, request: &Arc<SearchRequest>) -> Outcome {
        let role = self.role();
        let group_id = self.group_id();
        let result = match self {
            Mutation::AddGroup { .. } => add_group(request, role, group_id),
            Mutation::RemoveGroup { .. } => remove_group(request, role, group_id, false),
            Mutation::ExpireGroup { .. } => remove_group(request, role, group_id, true),
            Mutation::SoftRemoveGroup { .. } => {
                set_status(request, role, group_id, None, GroupStatus::Pending)
            }
            Mutation::UndoRemoveGroup { .. } => set_status(
                request,
                role,
                group_id,
                Some(GroupStatus::Pending),
                GroupStatus::Active,
            ),
            Mutation::HideGroup { .. } => set_status(
                request,
                role,
                group_id,
                Some(GroupStatus::Active),
                GroupStatus::Hidden,
            ),
            Mutation::EnableGroup { .. } => set_status(
                request,
                role,
                group_id,
                Some(GroupStatus::Hidden),
                GroupStatus::Active,
            ),
            Mutation::RenameGroup { name, .. } => edit_group(request, role, group_id, |group| {
                let name = Some(name.trim()).filter(|n| !n.is_empty()).map(str::to_string);
                if group.name == name {
                    return None;
                }
                group.name = name;
                Some(Refresh::None)
            }),
            Mutation::AddItem { item, .. } => edit_group(request, role, group_id, |group| {
                if group.find_item(&item.id).is_some() {
                    return None;
                }
                let item = place_item(group, item.clone());
                group.items.push(item);
                Some(group_refresh(role, group_id))
            }),
            Mutation::UpsertItem { item, .. } => edit_group(request, role, group_id, |group| {
                let item = place_item(group, item.clone());
                match group.items.iter().position(|it| it.id == item.id) {
                    Some(idx) if group.items[idx] == item => return None,
                    Some(idx) => group.items[idx] = item,
                    None => group.items.push(item),
                }
                Some(group_refresh(role, group_id))
            }),
            Mutation::UpdateItemStatus {
                item_id, status, ..
            } => edit_group(request, role, group_id, |group| {
                let item = group.items.iter_mut().find(|it| &it.id == item_id)?;
                if item.status == *status {
                    return None;
                }
                item.status = *status;
                Some(group_refresh(role, group_id))
            }),
            Mutation::RemoveItem { item_id, .. } => edit_group(request, role, group_id, |group| {
                let idx = group.items.iter().position(|it| &it.id == item_id)?;
                group.items.remove(idx);
                Some(group_refresh(role, group_id))
            }),
            Mutation::SetGroupProperty { command, .. } => {
                edit_group(request, role, group_id, |group| {
                    // mention and time only matter once the group is temporal
                    let affects_count =
                        matches!(command, GroupCommand::SetTemporal(_)) || group.temporal;
                    set_property(group, command).then(|| {
                        if affects_count {
                            group_refresh(role, group_id)
                        } else {
                            Refresh::None
                        }
                    })
                })
            }
            Mutation::RecordGroupCount { count, .. } => {
                edit_group(request, role, group_id, |group| {
                    if group.count == *count {
                        return None;
                    }
                    group.count = *count;
                    Some(Refresh::None)
                })
            }
        };

        match result {
            Some((next, refresh)) => Outcome {
                request: Arc::new(next),
                refresh,
            },
            None => Outcome::unchanged(request),
        }
    }
}

fn group_refresh(role: Role, group_id: &str) -> Refresh {
    Refresh::Group {
        role,
        group_id: group_id.to_string(),
    }
}

/// Clone the request and edit one group in place. `edit` returns `None`
/// when nothing changed, in which case the clone is dropped.
fn edit_group<F>(
    request: &SearchRequest,
    role: Role,
    group_id: &str,
    edit: F,
) -> Option<(SearchRequest, Refresh)>
where
    F: FnOnce(&mut SearchGroup) -> Option<Refresh>,
{
    request.find_group(role, group_id)?;
    let mut next = request.clone();
    let group = next.find_group_mut(role, group_id)?;
    let refresh = edit(group)?;
    Some((next, refresh))
}

fn add_group(
    request: &SearchRequest,
    role: Role,
    group_id: &str,
) -> Option<(SearchRequest, Refresh)> {
    if request.locate_group(group_id).is_some() {
        debug!(group_id, "group id already in use");
        return None;
    }
    let mut next = request.clone();
    next.groups_mut(role).push(SearchGroup::new(group_id));
    Some((next, Refresh::None))
}

fn remove_group(
    request: &SearchRequest,
    role: Role,
    group_id: &str,
    only_pending: bool,
) -> Option<(SearchRequest, Refresh)> {
    let group = request.find_group(role, group_id)?;
    if only_pending && group.status != GroupStatus::Pending {
        return None;
    }
    let mut next = request.clone();
    next.groups_mut(role).retain(|g| g.id != group_id);
    Some((
        next,
        Refresh::Forget {
            group_id: group_id.to_string(),
        },
    ))
}

fn set_status(
    request: &SearchRequest,
    role: Role,
    group_id: &str,
    from: Option<GroupStatus>,
    to: GroupStatus,
) -> Option<(SearchRequest, Refresh)> {
    edit_group(request, role, group_id, |group| {
        if group.status == to || from.is_some_and(|from| group.status != from) {
            return None;
        }
        group.status = to;
        Some(Refresh::Total)
    })
}

/// Items only sit on the secondary side of a temporal group.
fn place_item(group: &SearchGroup, mut item: SearchItem) -> SearchItem {
    if !group.temporal {
        item.temporal_group = TemporalSide::Primary;
    }
    item
}

/// Apply a property command, returning whether the group changed.
fn set_property(group: &mut SearchGroup, command: &GroupCommand) -> bool {
    match *command {
        GroupCommand::SetTemporal(temporal) => {
            if group.temporal == temporal {
                return false;
            }
            if temporal && !group.supports_temporal() {
                debug!(group_id = %group.id, "group items cannot take part in a temporal relationship");
                return false;
            }
            group.temporal = temporal;
            if !temporal {
                for item in &mut group.items {
                    item.temporal_group = TemporalSide::Primary;
                }
            }
            true
        }
        GroupCommand::SetMention(mention) => {
            if group.mention == mention {
                return false;
            }
            group.mention = mention;
            true
        }
        GroupCommand::SetTime(time) => {
            if group.time == time {
                return false;
            }
            group.time = time;
            true
        }
        GroupCommand::SetTimeValue(value) => {
            if group.time_value == value {
                return false;
            }
            group.time_value = value;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::{CriteriaNode, Domain};

    fn item(id: &str, domain: Domain) -> SearchItem {
        SearchItem::new(id, domain).with_parameter(CriteriaNode::new(1, domain, "SNOMED", "x"))
    }

    fn with_group(role: Role, id: &str) -> Arc<SearchRequest> {
        let empty = Arc::new(SearchRequest::new());
        Mutation::AddGroup {
            role,
            group_id: id.into(),
        }
        .apply(&empty)
        .request
    }

    fn add_item(req: &Arc<SearchRequest>, group_id: &str, item: SearchItem) -> Arc<SearchRequest> {
        Mutation::AddItem {
            role: Role::Includes,
            group_id: group_id.into(),
            item,
        }
        .apply(req)
        .request
    }

    #[test]
    fn add_group_appends_default_group() {
        let req = with_group(Role::Excludes, "groups_a");
        let group = &req.excludes[0];
        assert_eq!(group.id, "groups_a");
        assert!(!group.temporal);
        assert_eq!(group.mention, TemporalMention::AnyMention);
        assert_eq!(group.time, TemporalTime::DuringSameEncounterAs);
        assert_eq!(group.status, GroupStatus::Active);
    }

    #[test]
    fn add_then_remove_restores_request() {
        let empty = Arc::new(SearchRequest::new());
        let added = Mutation::AddGroup {
            role: Role::Includes,
            group_id: "g".into(),
        }
        .apply(&empty);
        let removed = Mutation::RemoveGroup {
            role: Role::Includes,
            group_id: "g".into(),
        }
        .apply(&added.request);
        assert_eq!(*removed.request, *empty);
        assert_eq!(
            removed.refresh,
            Refresh::Forget {
                group_id: "g".into()
            }
        );
        // input snapshots are untouched
        assert!(empty.includes.is_empty());
        assert_eq!(added.request.includes.len(), 1);
    }

    #[test]
    fn unknown_group_is_a_noop() {
        let req = with_group(Role::Includes, "g");
        for mutation in [
            Mutation::RemoveGroup {
                role: Role::Includes,
                group_id: "missing".into(),
            },
            Mutation::RemoveGroup {
                role: Role::Excludes,
                group_id: "g".into(),
            },
            Mutation::SetGroupProperty {
                role: Role::Includes,
                group_id: "missing".into(),
                command: GroupCommand::SetTemporal(true),
            },
            Mutation::RenameGroup {
                role: Role::Includes,
                group_id: "missing".into(),
                name: "x".into(),
            },
        ] {
            let outcome = mutation.apply(&req);
            assert!(Arc::ptr_eq(&outcome.request, &req));
            assert_eq!(outcome.refresh, Refresh::None);
        }
    }

    #[test]
    fn duplicate_group_id_is_refused() {
        let req = with_group(Role::Includes, "g");
        let outcome = Mutation::AddGroup {
            role: Role::Excludes,
            group_id: "g".into(),
        }
        .apply(&req);
        assert!(!outcome.changed_from(&req));
    }

    #[test]
    fn soft_remove_and_undo() {
        let req = with_group(Role::Includes, "g");
        let soft = Mutation::SoftRemoveGroup {
            role: Role::Includes,
            group_id: "g".into(),
        }
        .apply(&req);
        assert_eq!(soft.request.includes[0].status, GroupStatus::Pending);
        assert_eq!(soft.refresh, Refresh::Total);

        let undone = Mutation::UndoRemoveGroup {
            role: Role::Includes,
            group_id: "g".into(),
        }
        .apply(&soft.request);
        assert_eq!(undone.request.includes[0].status, GroupStatus::Active);

        // expiry only removes groups that are still pending
        let expired = Mutation::ExpireGroup {
            role: Role::Includes,
            group_id: "g".into(),
        }
        .apply(&undone.request);
        assert!(Arc::ptr_eq(&expired.request, &undone.request));

        let expired = Mutation::ExpireGroup {
            role: Role::Includes,
            group_id: "g".into(),
        }
        .apply(&soft.request);
        assert!(expired.request.includes.is_empty());
    }

    #[test]
    fn hide_and_enable() {
        let req = with_group(Role::Includes, "g");
        let hidden = Mutation::HideGroup {
            role: Role::Includes,
            group_id: "g".into(),
        }
        .apply(&req);
        assert_eq!(hidden.request.includes[0].status, GroupStatus::Hidden);
        let again = Mutation::HideGroup {
            role: Role::Includes,
            group_id: "g".into(),
        }
        .apply(&hidden.request);
        assert!(Arc::ptr_eq(&again.request, &hidden.request));
        let enabled = Mutation::EnableGroup {
            role: Role::Includes,
            group_id: "g".into(),
        }
        .apply(&hidden.request);
        assert_eq!(enabled.request.includes[0].status, GroupStatus::Active);
    }

    #[test]
    fn items_land_on_primary_side_of_plain_groups() {
        let req = with_group(Role::Includes, "g");
        let req = add_item(
            &req,
            "g",
            item("i", Domain::Drug).on_side(TemporalSide::Secondary),
        );
        assert_eq!(req.includes[0].items[0].temporal_group, TemporalSide::Primary);
    }

    #[test]
    fn add_item_requests_group_refresh() {
        let req = with_group(Role::Includes, "g");
        let outcome = Mutation::AddItem {
            role: Role::Includes,
            group_id: "g".into(),
            item: item("i", Domain::Condition),
        }
        .apply(&req);
        assert_eq!(
            outcome.refresh,
            Refresh::Group {
                role: Role::Includes,
                group_id: "g".into()
            }
        );
    }

    #[test]
    fn upsert_replaces_by_id() {
        let req = with_group(Role::Includes, "g");
        let req = add_item(&req, "g", item("i", Domain::Condition));
        let mut edited = item("i", Domain::Condition);
        edited.name = Some("renamed".into());
        let outcome = Mutation::UpsertItem {
            role: Role::Includes,
            group_id: "g".into(),
            item: edited.clone(),
        }
        .apply(&req);
        assert_eq!(outcome.request.includes[0].items, vec![edited.clone()]);

        let same = Mutation::UpsertItem {
            role: Role::Includes,
            group_id: "g".into(),
            item: edited,
        }
        .apply(&outcome.request);
        assert!(Arc::ptr_eq(&same.request, &outcome.request));
    }

    #[test]
    fn removing_last_item_keeps_group() {
        let req = with_group(Role::Includes, "g");
        let req = add_item(&req, "g", item("i", Domain::Condition));
        let outcome = Mutation::RemoveItem {
            role: Role::Includes,
            group_id: "g".into(),
            item_id: "i".into(),
        }
        .apply(&req);
        assert_eq!(outcome.request.includes.len(), 1);
        assert!(outcome.request.includes[0].is_disabled());
    }

    #[test]
    fn temporal_refused_for_demographics() {
        let req = with_group(Role::Includes, "g");
        let req = add_item(&req, "g", item("p", Domain::Person));
        let outcome = Mutation::SetGroupProperty {
            role: Role::Includes,
            group_id: "g".into(),
            command: GroupCommand::SetTemporal(true),
        }
        .apply(&req);
        assert!(Arc::ptr_eq(&outcome.request, &req));
    }

    #[test]
    fn disabling_temporal_folds_secondary_items() {
        let req = with_group(Role::Includes, "g");
        let req = Mutation::SetGroupProperty {
            role: Role::Includes,
            group_id: "g".into(),
            command: GroupCommand::SetTemporal(true),
        }
        .apply(&req)
        .request;
        let req = add_item(&req, "g", item("a", Domain::Condition));
        let req = add_item(
            &req,
            "g",
            item("b", Domain::Drug).on_side(TemporalSide::Secondary),
        );
        assert_eq!(req.includes[0].items[1].temporal_group, TemporalSide::Secondary);

        let off = Mutation::SetGroupProperty {
            role: Role::Includes,
            group_id: "g".into(),
            command: GroupCommand::SetTemporal(false),
        }
        .apply(&req);
        assert!(off.request.includes[0]
            .items
            .iter()
            .all(|it| it.temporal_group == TemporalSide::Primary));
    }

    #[test]
    fn property_setters_skip_unchanged_values() {
        let req = with_group(Role::Includes, "g");
        let same = Mutation::SetGroupProperty {
            role: Role::Includes,
            group_id: "g".into(),
            command: GroupCommand::SetMention(TemporalMention::AnyMention),
        }
        .apply(&req);
        assert!(Arc::ptr_eq(&same.request, &req));

        let changed = Mutation::SetGroupProperty {
            role: Role::Includes,
            group_id: "g".into(),
            command: GroupCommand::SetTimeValue(Some(7)),
        }
        .apply(&req);
        assert_eq!(changed.request.includes[0].time_value, Some(7));
    }

    #[test]
    fn rename_trims_and_clears() {
        let req = with_group(Role::Includes, "g");
        let named = Mutation::RenameGroup {
            role: Role::Includes,
            group_id: "g".into(),
            name: "  Diabetics ".into(),
        }
        .apply(&req);
        assert_eq!(named.request.includes[0].name.as_deref(), Some("Diabetics"));
        assert_eq!(named.refresh, Refresh::None);
        let cleared = Mutation::RenameGroup {
            role: Role::Includes,
            group_id: "g".into(),
            name: "".into(),
        }
        .apply(&named.request);
        assert_eq!(cleared.request.includes[0].name, None);
    }
}
