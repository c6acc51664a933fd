//! The search request: include/exclude group lists plus data filters.

use crate::domain::Role;
use crate::group::{SearchGroup, TemporalMention, TemporalTime};
use crate::item::{SearchItem, TemporalSide};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub includes: Vec<SearchGroup>,
    #[serde(default)]
    pub excludes: Vec<SearchGroup>,
    #[serde(default, alias = "datafilters")]
    pub data_filters: Vec<String>,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self, role: Role) -> &[SearchGroup] {
        match role {
            Role::Includes => &self.includes,
            Role::Excludes => &self.excludes,
        }
    }

    pub fn groups_mut(&mut self, role: Role) -> &mut Vec<SearchGroup> {
        match role {
            Role::Includes => &mut self.includes,
            Role::Excludes => &mut self.excludes,
        }
    }

    pub fn find_group(&self, role: Role, group_id: &str) -> Option<&SearchGroup> {
        self.groups(role).iter().find(|g| g.id == group_id)
    }

    pub fn find_group_mut(&mut self, role: Role, group_id: &str) -> Option<&mut SearchGroup> {
        self.groups_mut(role).iter_mut().find(|g| g.id == group_id)
    }

    /// Find a group by id in either list, returning its role and index.
    pub fn locate_group(&self, group_id: &str) -> Option<(Role, usize)> {
        Role::ALL.into_iter().find_map(|role| {
            self.groups(role)
                .iter()
                .position(|g| g.id == group_id)
                .map(|idx| (role, idx))
        })
    }

    /// Every group in request order, includes first.
    pub fn all_groups(&self) -> impl Iterator<Item = (Role, &SearchGroup)> {
        self.includes
            .iter()
            .map(|g| (Role::Includes, g))
            .chain(self.excludes.iter().map(|g| (Role::Excludes, g)))
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    /// At least one active group with an active item.
    pub fn has_active_items(&self) -> bool {
        self.all_groups()
            .any(|(_, g)| g.is_active() && g.has_active_items())
    }

    /// The subset of the request sent to the participant counter: active
    /// groups holding active items, and only their active items.
    pub fn count_projection(&self) -> SearchRequest {
        let project = |groups: &[SearchGroup]| -> Vec<SearchGroup> {
            groups
                .iter()
                .filter(|g| g.is_active() && g.has_active_items())
                .map(project_group)
                .collect()
        };
        SearchRequest {
            includes: project(&self.includes),
            excludes: project(&self.excludes),
            data_filters: self.data_filters.clone(),
        }
    }

    /// Request used to count a single group on its own.
    pub fn group_projection(role: Role, group: &SearchGroup) -> SearchRequest {
        let mut request = SearchRequest::new();
        request.groups_mut(role).push(project_group(group));
        request
    }
}

fn project_group(group: &SearchGroup) -> SearchGroup {
    let items = group
        .active_items()
        .map(|it| project_item(it, group.temporal))
        .collect();
    let mut projected = SearchGroup {
        id: group.id.clone(),
        name: group.name.clone(),
        items,
        temporal: group.temporal,
        mention: TemporalMention::default(),
        time: TemporalTime::default(),
        time_value: None,
        status: group.status,
        count: None,
    };
    if group.temporal {
        projected.mention = group.mention;
        projected.time = group.time;
        projected.time_value = group.time_value;
    }
    projected
}

fn project_item(item: &SearchItem, temporal: bool) -> SearchItem {
    let mut projected = item.clone();
    projected.count = None;
    if !temporal {
        projected.temporal_group = TemporalSide::Primary;
    }
    projected
}
