use crate::criteria::CriteriaNode;
use crate::domain::Domain;
use crate::modifier::Modifier;
use serde::{Deserialize, Serialize};

/// Side of a temporal relationship an item sits on, serialized as `0` / `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TemporalSide {
    #[default]
    Primary,
    Secondary,
}

impl From<TemporalSide> for u8 {
    fn from(side: TemporalSide) -> Self {
        match side {
            TemporalSide::Primary => 0,
            TemporalSide::Secondary => 1,
        }
    }
}

impl TryFrom<u8> for TemporalSide {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TemporalSide::Primary),
            1 => Ok(TemporalSide::Secondary),
            other => Err(format!("temporalGroup must be 0 or 1, got {other}")),
        }
    }
}

/// Item lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Active,
    Pending,
    Removed,
}

/// One queryable unit inside a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    pub id: String,
    #[serde(rename = "type")]
    pub domain: Domain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub search_parameters: Vec<CriteriaNode>,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    #[serde(default)]
    pub temporal_group: TemporalSide,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl SearchItem {
    pub fn new(id: impl Into<String>, domain: Domain) -> Self {
        Self {
            id: id.into(),
            domain,
            name: None,
            search_parameters: Vec::new(),
            modifiers: Vec::new(),
            temporal_group: TemporalSide::Primary,
            status: ItemStatus::Active,
            count: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<CriteriaNode>) -> Self {
        self.search_parameters = parameters;
        self
    }

    pub fn with_parameter(mut self, parameter: CriteriaNode) -> Self {
        self.search_parameters.push(parameter);
        self
    }

    pub fn with_modifiers(mut self, modifiers: Vec<Modifier>) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn on_side(mut self, side: TemporalSide) -> Self {
        self.temporal_group = side;
        self
    }

    /// Active status and at least one selected criterion.
    pub fn is_active(&self) -> bool {
        self.status == ItemStatus::Active && !self.search_parameters.is_empty()
    }
}
