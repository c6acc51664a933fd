use crate::item::{SearchItem, TemporalSide};
use serde::{Deserialize, Serialize};

/// Which mention of the first side's criteria anchors the relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemporalMention {
    #[default]
    AnyMention,
    FirstMention,
    LastMention,
}

/// Time relationship between the two temporal sides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemporalTime {
    #[default]
    DuringSameEncounterAs,
    XDaysBefore,
    XDaysAfter,
    WithinXDaysOf,
}

impl TemporalTime {
    /// Everything except "same encounter" needs a day count.
    pub fn requires_value(&self) -> bool {
        !matches!(self, TemporalTime::DuringSameEncounterAs)
    }
}

/// Group lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    #[default]
    Active,
    /// Soft-deleted, waiting out the undo grace window.
    Pending,
    /// Suppressed from the total count.
    Hidden,
}

/// A set of items combined with OR, optionally split into two temporal sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchGroup {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub items: Vec<SearchItem>,
    #[serde(default)]
    pub temporal: bool,
    #[serde(default)]
    pub mention: TemporalMention,
    #[serde(default)]
    pub time: TemporalTime,
    #[serde(default)]
    pub time_value: Option<i64>,
    #[serde(default)]
    pub status: GroupStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl SearchGroup {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            items: Vec::new(),
            temporal: false,
            mention: TemporalMention::AnyMention,
            time: TemporalTime::DuringSameEncounterAs,
            time_value: None,
            status: GroupStatus::Active,
            count: None,
        }
    }

    pub fn with_item(mut self, item: SearchItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == GroupStatus::Active
    }

    pub fn has_active_items(&self) -> bool {
        self.items.iter().any(SearchItem::is_active)
    }

    pub fn active_items(&self) -> impl Iterator<Item = &SearchItem> {
        self.items.iter().filter(|it| it.is_active())
    }

    /// Active items on one temporal side.
    pub fn active_items_on(&self, side: TemporalSide) -> impl Iterator<Item = &SearchItem> {
        self.active_items().filter(move |it| it.temporal_group == side)
    }

    /// No items and not temporal: never a count target.
    pub fn is_disabled(&self) -> bool {
        self.items.is_empty() && !self.temporal
    }

    /// Temporal groups whose time relationship needs a day count.
    pub fn requires_time_value(&self) -> bool {
        self.temporal && self.time.requires_value()
    }

    /// Whether every item's domain can participate in a temporal relationship.
    pub fn supports_temporal(&self) -> bool {
        self.items.iter().all(|it| it.domain.supports_temporal())
    }

    pub fn find_item(&self, item_id: &str) -> Option<&SearchItem> {
        self.items.iter().find(|it| it.id == item_id)
    }
}
