use crate::criteria::Operator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Extra constraints that can be attached to a search item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModifierType {
    AgeAtEvent,
    NumOfOccurrences,
    EventDate,
    Encounters,
}

impl ModifierType {
    pub fn label(&self) -> &'static str {
        match self {
            ModifierType::AgeAtEvent => "Age At Event",
            ModifierType::NumOfOccurrences => "Has Occurrences",
            ModifierType::EventDate => "Event Date",
            ModifierType::Encounters => "During Visit Type",
        }
    }
}

impl fmt::Display for ModifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A modifier on a search item, e.g. age at event >= 65.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifier {
    pub name: ModifierType,
    pub operator: Operator,
    #[serde(default)]
    pub operands: Vec<String>,
}

impl Modifier {
    pub fn new(name: ModifierType, operator: Operator, operands: &[&str]) -> Self {
        Self {
            name,
            operator,
            operands: operands.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn age_at_event(operator: Operator, operands: &[&str]) -> Self {
        Self::new(ModifierType::AgeAtEvent, operator, operands)
    }

    pub fn occurrences_at_least(times: u32) -> Self {
        Self {
            name: ModifierType::NumOfOccurrences,
            operator: Operator::GreaterThanOrEqualTo,
            operands: vec![times.to_string()],
        }
    }

    /// Restrict events to a single visit type concept.
    pub fn encounters(visit_concept_id: i64) -> Self {
        Self {
            name: ModifierType::Encounters,
            operator: Operator::In,
            operands: vec![visit_concept_id.to_string()],
        }
    }
}
