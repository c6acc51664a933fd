//! Validation rules that gate count queries and saving.
//!
//! Problems are reported as [`ValidationIssue`] values rather than errors:
//! an invalid form is a normal state while the user is still editing.

use crate::criteria::{AttrName, Attribute, CriteriaNode, Operator};
use crate::domain::Domain;
use crate::group::SearchGroup;
use crate::item::{SearchItem, TemporalSide};
use crate::modifier::{Modifier, ModifierType};
use crate::request::SearchRequest;
use thiserror::Error;
use time::macros::format_description;

/// Largest number of days accepted for a temporal time window.
pub const MAX_TIME_VALUE: i64 = 9999;
pub const MAX_AGE_AT_EVENT: f64 = 120.0;
pub const MIN_OCCURRENCES: f64 = 1.0;
pub const MAX_OCCURRENCES: f64 = 99.0;

/// Modifiers that survey items accept.
pub const SURVEY_MODIFIERS: &[ModifierType] = &[ModifierType::AgeAtEvent];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationIssue {
    #[error("Temporal groups need at least one active item on each side")]
    TemporalSideEmpty { side: TemporalSide },

    #[error("Number of days is required")]
    TimeValueRequired,

    #[error("Number of days must be between 0 - 9999")]
    TimeValueOutOfRange { value: i64 },

    #[error("An operator is required for {attribute:?}")]
    MissingOperator { attribute: AttrName },

    #[error("{operator} requires {expected} operands, found {found}")]
    OperandCount {
        operator: Operator,
        expected: String,
        found: usize,
    },

    #[error("Form can only accept valid numbers")]
    InvalidNumber,

    #[error("Form cannot accept negative values")]
    NegativeValue,

    #[error("Values must be between {min} and {max}")]
    OutOfBounds { min: f64, max: f64 },

    #[error("{modifier} is required")]
    ModifierValueRequired { modifier: ModifierType },

    #[error("Age At Event must be between 0 - 120")]
    AgeOutOfRange,

    #[error("Age At Event must be a whole number")]
    AgeNotWhole,

    #[error("Dates must be in format 'YYYY-MM-DD'")]
    DateFormat,

    #[error("Has Occurrences must be between 1 - 99")]
    OccurrencesOutOfRange,

    #[error("Has Occurrences must be a whole number")]
    OccurrencesNotWhole,

    #[error("During Visit Type requires a single visit type")]
    EncountersOperand,

    #[error("{modifier} is not available for {domain}")]
    ModifierNotAllowed {
        modifier: ModifierType,
        domain: &'static str,
    },
}

fn push_unique(issues: &mut Vec<ValidationIssue>, issue: ValidationIssue) {
    if !issues.contains(&issue) {
        issues.push(issue);
    }
}

/// Issues with a group's temporal configuration. Empty for non-temporal groups.
pub fn temporal_issues(group: &SearchGroup) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if !group.temporal {
        return issues;
    }
    for side in [TemporalSide::Primary, TemporalSide::Secondary] {
        if group.active_items_on(side).next().is_none() {
            issues.push(ValidationIssue::TemporalSideEmpty { side });
        }
    }
    if group.time.requires_value() {
        match group.time_value {
            None => issues.push(ValidationIssue::TimeValueRequired),
            Some(value) if !(0..=MAX_TIME_VALUE).contains(&value) => {
                issues.push(ValidationIssue::TimeValueOutOfRange { value })
            }
            Some(_) => {}
        }
    }
    issues
}

/// A temporal group is in error when either side has no active item, or the
/// time relationship needs a day count that is missing or out of range.
pub fn temporal_error(group: &SearchGroup) -> bool {
    !temporal_issues(group).is_empty()
}

fn parse_number(operand: &str) -> Option<f64> {
    operand.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn check_attribute(domain: Domain, attr: &Attribute, issues: &mut Vec<ValidationIssue>) -> bool {
    let Some(operator) = attr.operator else {
        push_unique(
            issues,
            ValidationIssue::MissingOperator {
                attribute: attr.name,
            },
        );
        return false;
    };
    if operator == Operator::Any || attr.name == AttrName::Any {
        return true;
    }
    let mut valid = true;
    let arity = operator.arity();
    if !arity.accepts(attr.operands.len()) {
        valid = false;
        push_unique(
            issues,
            ValidationIssue::OperandCount {
                operator,
                expected: arity.to_string(),
                found: attr.operands.len(),
            },
        );
    }
    if !attr.is_numeric() {
        return valid;
    }

    let numbers: Vec<Option<f64>> = attr.operands.iter().map(|op| parse_number(op)).collect();
    if numbers.iter().any(Option::is_none) {
        valid = false;
        push_unique(issues, ValidationIssue::InvalidNumber);
    }
    let parsed: Vec<f64> = numbers.into_iter().flatten().collect();
    if domain.is_physical_measurement() && parsed.iter().any(|n| *n < 0.0) {
        valid = false;
        push_unique(issues, ValidationIssue::NegativeValue);
    }
    if let (Some(min), Some(max)) = (attr.min, attr.max) {
        if parsed.iter().any(|n| *n < min || *n > max) {
            valid = false;
            push_unique(issues, ValidationIssue::OutOfBounds { min, max });
        }
    }
    valid
}

/// Issues with the attributes of one selected criterion.
pub fn attribute_issues(node: &CriteriaNode) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for attr in &node.attributes {
        check_attribute(node.domain_id, attr, &mut issues);
    }
    issues
}

/// Whether a criterion's attribute form can be submitted.
///
/// A measurement with at least one category selected is accepted even when
/// its numeric part is incomplete.
pub fn node_attributes_valid(node: &CriteriaNode) -> bool {
    let mut issues = Vec::new();
    let all_valid = node
        .attributes
        .iter()
        .fold(true, |ok, attr| check_attribute(node.domain_id, attr, &mut issues) && ok);
    all_valid
        || (node.domain_id == Domain::Measurement
            && node
                .attributes
                .iter()
                .any(|a| a.name == AttrName::Cat && !a.operands.is_empty()))
}

pub fn attribute_form_valid(item: &SearchItem) -> bool {
    item.search_parameters.iter().all(node_attributes_valid)
}

fn check_whole_number(
    value: &str,
    min: f64,
    max: f64,
    out_of_range: ValidationIssue,
    not_whole: ValidationIssue,
) -> Option<ValidationIssue> {
    match parse_number(value) {
        Some(n) if n < min || n > max => Some(out_of_range),
        Some(n) if n.fract() == 0.0 => None,
        _ => Some(not_whole),
    }
}

fn check_modifier_value(name: ModifierType, value: &str) -> Option<ValidationIssue> {
    if value.trim().is_empty() {
        return Some(ValidationIssue::ModifierValueRequired { modifier: name });
    }
    match name {
        ModifierType::AgeAtEvent => check_whole_number(
            value,
            0.0,
            MAX_AGE_AT_EVENT,
            ValidationIssue::AgeOutOfRange,
            ValidationIssue::AgeNotWhole,
        ),
        ModifierType::NumOfOccurrences => check_whole_number(
            value,
            MIN_OCCURRENCES,
            MAX_OCCURRENCES,
            ValidationIssue::OccurrencesOutOfRange,
            ValidationIssue::OccurrencesNotWhole,
        ),
        ModifierType::EventDate => {
            let format = format_description!("[year]-[month]-[day]");
            time::Date::parse(value, &format)
                .err()
                .map(|_| ValidationIssue::DateFormat)
        }
        ModifierType::Encounters => None,
    }
}

fn check_modifier(domain: Domain, modifier: &Modifier, issues: &mut Vec<ValidationIssue>) {
    if domain == Domain::Survey && !SURVEY_MODIFIERS.contains(&modifier.name) {
        push_unique(
            issues,
            ValidationIssue::ModifierNotAllowed {
                modifier: modifier.name,
                domain: domain.title(),
            },
        );
    }
    if modifier.name == ModifierType::Encounters {
        if modifier.operator != Operator::In || modifier.operands.len() != 1 {
            push_unique(issues, ValidationIssue::EncountersOperand);
        }
        return;
    }
    let arity = modifier.operator.arity();
    if !arity.accepts(modifier.operands.len()) {
        push_unique(
            issues,
            ValidationIssue::OperandCount {
                operator: modifier.operator,
                expected: arity.to_string(),
                found: modifier.operands.len(),
            },
        );
    }
    for value in &modifier.operands {
        if let Some(issue) = check_modifier_value(modifier.name, value) {
            push_unique(issues, issue);
        }
    }
}

/// Issues with an item's modifiers.
pub fn modifier_issues(item: &SearchItem) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for modifier in &item.modifiers {
        check_modifier(item.domain, modifier, &mut issues);
    }
    issues
}

pub fn modifiers_valid(item: &SearchItem) -> bool {
    modifier_issues(item).is_empty()
}

/// Whether an item passes attribute and modifier checks.
pub fn item_valid(item: &SearchItem) -> bool {
    attribute_form_valid(item) && modifiers_valid(item)
}

/// A group can be counted or saved when its temporal configuration is
/// complete and every active item is valid.
pub fn group_count_eligible(group: &SearchGroup) -> bool {
    !temporal_error(group) && group.active_items().all(item_valid)
}

/// At least one active group with an active item, and every such group
/// count-eligible.
pub fn request_saveable(request: &SearchRequest) -> bool {
    request.has_active_items() && !definition_errors(request)
}

/// Any active group with active items that is not count-eligible, either
/// through a broken temporal setup or an invalid item.
pub fn definition_errors(request: &SearchRequest) -> bool {
    request
        .all_groups()
        .any(|(_, g)| g.is_active() && g.has_active_items() && !group_count_eligible(g))
}
