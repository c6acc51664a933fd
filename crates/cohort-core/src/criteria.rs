//! Criteria selected from the catalog and the attributes attached to them.
//!
//! A [`CriteriaNode`] is copied into a search item when selected. The same
//! catalog entries are reused across searches, so nodes are never shared by
//! reference between items.

use crate::domain::Domain;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Criteria type used for the deceased demographic filter.
pub const DECEASED_TYPE: &str = "DECEASED";

/// One selectable criterion (condition code, drug ingredient, age range, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaNode {
    pub id: i64,
    /// Stable selection key, `param<conceptId|id><operator codes>`.
    #[serde(default)]
    pub parameter_id: String,
    pub domain_id: Domain,
    #[serde(rename = "type")]
    pub criteria_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default)]
    pub is_standard: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// True when the node is a parent that selects its whole subtree.
    #[serde(default)]
    pub group: bool,
    #[serde(default)]
    pub has_ancestor_data: bool,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl CriteriaNode {
    pub fn new(
        id: i64,
        domain_id: Domain,
        criteria_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            parameter_id: format!("param{id}"),
            domain_id,
            criteria_type: criteria_type.into(),
            subtype: None,
            is_standard: false,
            concept_id: None,
            code: None,
            name: name.into(),
            count: None,
            group: false,
            has_ancestor_data: false,
            attributes: Vec::new(),
        }
    }

    /// The deceased filter has no concept and a fixed display name.
    pub fn deceased() -> Self {
        let mut node = Self::new(0, Domain::Person, DECEASED_TYPE, "Deceased");
        node.parameter_id = String::new();
        node
    }

    pub fn with_concept_id(mut self, concept_id: i64) -> Self {
        self.concept_id = Some(concept_id);
        self.parameter_id = format!("param{concept_id}");
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn standard(mut self, is_standard: bool) -> Self {
        self.is_standard = is_standard;
        self
    }

    /// Attach attributes and extend the parameter id with the operator codes so
    /// the same concept with different ranges stays distinct in a selection.
    pub fn with_attributes(mut self, attributes: Vec<Attribute>) -> Self {
        let codes: String = attributes
            .iter()
            .filter_map(|a| a.operator.map(|op| op.code()))
            .collect();
        self.parameter_id.push_str(&codes);
        self.attributes = attributes;
        self
    }

    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }

    pub fn is_deceased(&self) -> bool {
        self.criteria_type == DECEASED_TYPE
    }
}

/// Kind of value an attribute constrains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttrName {
    Num,
    Cat,
    Age,
    Any,
}

/// Comparison operators shared by attributes and modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqualTo,
    GreaterThanOrEqualTo,
    Between,
    In,
    Any,
}

/// How many operands an operator takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, found: usize) -> bool {
        match *self {
            Arity::Exactly(n) => found == n,
            Arity::AtLeast(n) => found >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

impl Operator {
    pub fn arity(&self) -> Arity {
        match self {
            Operator::Any => Arity::Exactly(0),
            Operator::Between => Arity::Exactly(2),
            Operator::In => Arity::AtLeast(1),
            _ => Arity::Exactly(1),
        }
    }

    /// Short code appended to parameter ids.
    pub fn code(&self) -> &'static str {
        match self {
            Operator::Any => "Any",
            Operator::Equal => "01",
            Operator::GreaterThanOrEqualTo => "02",
            Operator::LessThanOrEqualTo => "03",
            Operator::Between => "04",
            Operator::NotEqual => "05",
            Operator::LessThan => "06",
            Operator::GreaterThan => "07",
            Operator::In => "08",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "EQUAL",
            Operator::NotEqual => "NOT_EQUAL",
            Operator::LessThan => "LESS_THAN",
            Operator::GreaterThan => "GREATER_THAN",
            Operator::LessThanOrEqualTo => "LESS_THAN_OR_EQUAL_TO",
            Operator::GreaterThanOrEqualTo => "GREATER_THAN_OR_EQUAL_TO",
            Operator::Between => "BETWEEN",
            Operator::In => "IN",
            Operator::Any => "ANY",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value constraint attached to a criterion (e.g. a lab value range).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: AttrName,
    #[serde(default)]
    pub operator: Option<Operator>,
    #[serde(default)]
    pub operands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_id: Option<i64>,
    /// Lower numeric bound the catalog attaches to the criterion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Attribute {
    pub fn new(name: AttrName, operator: Operator, operands: &[&str]) -> Self {
        Self {
            name,
            operator: Some(operator),
            operands: operands.iter().map(|s| s.to_string()).collect(),
            concept_id: None,
            min: None,
            max: None,
        }
    }

    /// A numeric attribute with no operator chosen yet.
    pub fn unset(name: AttrName) -> Self {
        Self {
            name,
            operator: None,
            operands: Vec::new(),
            concept_id: None,
            min: None,
            max: None,
        }
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_concept_id(mut self, concept_id: i64) -> Self {
        self.concept_id = Some(concept_id);
        self
    }

    /// Categorical attributes carry concept ids, not numbers.
    pub fn is_numeric(&self) -> bool {
        !matches!(self.name, AttrName::Cat)
    }
}
