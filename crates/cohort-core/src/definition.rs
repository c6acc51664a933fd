//! Persisted cohort definition format.
//!
//! Saved cohorts store the count projection of a request, with search
//! parameters using `domain`/`standard`/`ancestorData` keys instead of the
//! in-memory criteria names. Loading fills in the defaults the editor expects.

use crate::criteria::{Attribute, CriteriaNode};
use crate::domain::Domain;
use crate::error::{CoreError, Result};
use crate::group::{GroupStatus, SearchGroup, TemporalMention, TemporalTime};
use crate::item::{ItemStatus, SearchItem, TemporalSide};
use crate::modifier::Modifier;
use crate::request::SearchRequest;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortDefinition {
    #[serde(default)]
    pub includes: Vec<DefinitionGroup>,
    #[serde(default)]
    pub excludes: Vec<DefinitionGroup>,
    #[serde(default, alias = "datafilters")]
    pub data_filters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionGroup {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub items: Vec<DefinitionItem>,
    #[serde(default)]
    pub temporal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention: Option<TemporalMention>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TemporalTime>,
    #[serde(
        default,
        deserialize_with = "lenient_time_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionItem {
    pub id: String,
    #[serde(rename = "type")]
    pub domain: Domain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub search_parameters: Vec<SearchParameter>,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal_group: Option<TemporalSide>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParameter {
    pub parameter_id: String,
    pub name: String,
    pub domain: Domain,
    #[serde(rename = "type")]
    pub criteria_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default)]
    pub group: bool,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_id: Option<i64>,
    #[serde(default)]
    pub ancestor_data: bool,
    #[serde(default)]
    pub standard: bool,
}

/// Older definitions store `timeValue` as a string, sometimes empty.
fn lenient_time_value<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("timeValue must be an integer, got {n}"))),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("timeValue must be an integer, got {s:?}"))),
        Some(other) => Err(D::Error::custom(format!(
            "timeValue must be an integer, got {other}"
        ))),
    }
}

/// Remove markup the catalog embeds in display names (search highlights).
pub fn strip_html(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_tag = false;
    for c in name.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

impl CohortDefinition {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Build the persisted form of a request from its count projection.
    pub fn from_request(request: &SearchRequest) -> Self {
        let projected = request.count_projection();
        Self {
            includes: projected.includes.iter().map(DefinitionGroup::from).collect(),
            excludes: projected.excludes.iter().map(DefinitionGroup::from).collect(),
            data_filters: projected.data_filters,
        }
    }

    /// Hydrate an editable request, assigning editor defaults.
    ///
    /// Fails if a group or item id appears more than once.
    pub fn into_request(self) -> Result<SearchRequest> {
        let mut seen = HashSet::new();
        let mut convert = |groups: Vec<DefinitionGroup>| -> Result<Vec<SearchGroup>> {
            groups
                .into_iter()
                .map(|g| g.into_group(&mut seen))
                .collect()
        };
        let request = SearchRequest {
            includes: convert(self.includes)?,
            excludes: convert(self.excludes)?,
            data_filters: self.data_filters,
        };
        tracing::debug!(
            includes = request.includes.len(),
            excludes = request.excludes.len(),
            "parsed cohort definition"
        );
        Ok(request)
    }

    /// Every group and item id in the definition.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.includes
            .iter()
            .chain(self.excludes.iter())
            .flat_map(|g| std::iter::once(g.id.as_str()).chain(g.items.iter().map(|it| it.id.as_str())))
    }
}

impl DefinitionGroup {
    fn into_group(self, seen: &mut HashSet<String>) -> Result<SearchGroup> {
        if !seen.insert(self.id.clone()) {
            return Err(CoreError::duplicate_id(self.id));
        }
        let temporal = self.temporal;
        let items = self
            .items
            .into_iter()
            .map(|it| it.into_item(temporal, seen))
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchGroup {
            id: self.id,
            name: self.name,
            items,
            temporal,
            mention: self.mention.unwrap_or_default(),
            time: self.time.unwrap_or_default(),
            time_value: self.time_value,
            status: GroupStatus::Active,
            count: None,
        })
    }
}

impl From<&SearchGroup> for DefinitionGroup {
    fn from(group: &SearchGroup) -> Self {
        let temporal = group.temporal;
        Self {
            id: group.id.clone(),
            name: group.name.clone(),
            items: group.items.iter().map(|it| DefinitionItem::from_item(it, temporal)).collect(),
            temporal,
            mention: temporal.then_some(group.mention),
            time: temporal.then_some(group.time),
            time_value: if temporal { group.time_value } else { None },
        }
    }
}

impl DefinitionItem {
    fn from_item(item: &SearchItem, temporal: bool) -> Self {
        Self {
            id: item.id.clone(),
            domain: item.domain,
            name: item.name.clone(),
            search_parameters: item.search_parameters.iter().map(SearchParameter::from).collect(),
            modifiers: item.modifiers.clone(),
            temporal_group: temporal.then_some(item.temporal_group),
        }
    }

    fn into_item(self, temporal: bool, seen: &mut HashSet<String>) -> Result<SearchItem> {
        if !seen.insert(self.id.clone()) {
            return Err(CoreError::duplicate_id(self.id));
        }
        let temporal_group = if temporal {
            self.temporal_group.unwrap_or_default()
        } else {
            TemporalSide::Primary
        };
        Ok(SearchItem {
            id: self.id,
            domain: self.domain,
            name: self.name,
            search_parameters: self
                .search_parameters
                .into_iter()
                .map(CriteriaNode::from)
                .collect(),
            modifiers: self.modifiers,
            temporal_group,
            status: ItemStatus::Active,
            count: None,
        })
    }
}

impl From<&CriteriaNode> for SearchParameter {
    fn from(node: &CriteriaNode) -> Self {
        Self {
            parameter_id: node.parameter_id.clone(),
            name: strip_html(&node.name),
            domain: node.domain_id,
            criteria_type: node.criteria_type.clone(),
            subtype: if node.domain_id == Domain::Survey {
                node.subtype.clone()
            } else {
                None
            },
            group: node.group,
            attributes: node.attributes.clone(),
            concept_id: node.concept_id,
            ancestor_data: node.has_ancestor_data,
            standard: node.is_standard,
        }
    }
}

impl From<SearchParameter> for CriteriaNode {
    /// Saved parameters carry no catalog node id, so the concept id stands in.
    fn from(sp: SearchParameter) -> Self {
        CriteriaNode {
            id: sp.concept_id.unwrap_or_default(),
            parameter_id: sp.parameter_id,
            domain_id: sp.domain,
            criteria_type: sp.criteria_type,
            subtype: sp.subtype,
            is_standard: sp.standard,
            concept_id: sp.concept_id,
            code: None,
            name: sp.name,
            count: None,
            group: sp.group,
            has_ancestor_data: sp.ancestor_data,
            attributes: sp.attributes,
        }
    }
}
