use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Criteria domains a search item can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Domain {
    Condition,
    Procedure,
    Measurement,
    Drug,
    Observation,
    Visit,
    Person,
    PhysicalMeasurement,
    PhysicalMeasurementCss,
    Survey,
    AllEvents,
    Fitbit,
    Lab,
    Vital,
}

impl Domain {
    /// Wire name of the domain.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Condition => "CONDITION",
            Domain::Procedure => "PROCEDURE",
            Domain::Measurement => "MEASUREMENT",
            Domain::Drug => "DRUG",
            Domain::Observation => "OBSERVATION",
            Domain::Visit => "VISIT",
            Domain::Person => "PERSON",
            Domain::PhysicalMeasurement => "PHYSICAL_MEASUREMENT",
            Domain::PhysicalMeasurementCss => "PHYSICAL_MEASUREMENT_CSS",
            Domain::Survey => "SURVEY",
            Domain::AllEvents => "ALL_EVENTS",
            Domain::Fitbit => "FITBIT",
            Domain::Lab => "LAB",
            Domain::Vital => "VITAL",
        }
    }

    /// Human readable title used in messages.
    pub fn title(&self) -> &'static str {
        match self {
            Domain::Person => "Demographics",
            Domain::Measurement => "Labs and Measurements",
            Domain::PhysicalMeasurement | Domain::PhysicalMeasurementCss => {
                "Physical Measurements"
            }
            Domain::Visit => "Visits",
            Domain::Drug => "Drugs",
            Domain::Condition => "Conditions",
            Domain::Procedure => "Procedures",
            Domain::Observation => "Observations",
            Domain::Lab => "Labs",
            Domain::Vital => "Vitals",
            Domain::Survey => "Surveys",
            Domain::AllEvents => "All Events",
            Domain::Fitbit => "Fitbit",
        }
    }

    pub fn is_physical_measurement(&self) -> bool {
        matches!(
            self,
            Domain::PhysicalMeasurement | Domain::PhysicalMeasurementCss
        )
    }

    /// Demographics, physical measurements and surveys have no event dates and
    /// so cannot take part in a temporal relationship.
    pub fn supports_temporal(&self) -> bool {
        !matches!(
            self,
            Domain::Person
                | Domain::PhysicalMeasurement
                | Domain::PhysicalMeasurementCss
                | Domain::Survey
        )
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONDITION" => Ok(Domain::Condition),
            "PROCEDURE" => Ok(Domain::Procedure),
            "MEASUREMENT" => Ok(Domain::Measurement),
            "DRUG" => Ok(Domain::Drug),
            "OBSERVATION" => Ok(Domain::Observation),
            "VISIT" => Ok(Domain::Visit),
            "PERSON" => Ok(Domain::Person),
            "PHYSICAL_MEASUREMENT" => Ok(Domain::PhysicalMeasurement),
            "PHYSICAL_MEASUREMENT_CSS" => Ok(Domain::PhysicalMeasurementCss),
            "SURVEY" => Ok(Domain::Survey),
            "ALL_EVENTS" => Ok(Domain::AllEvents),
            "FITBIT" => Ok(Domain::Fitbit),
            "LAB" => Ok(Domain::Lab),
            "VITAL" => Ok(Domain::Vital),
            _ => Err(CoreError::invalid_definition(format!("Unknown domain: {s}"))),
        }
    }
}

/// Which side of the request a group belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Includes,
    Excludes,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Includes, Role::Excludes];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Includes => "includes",
            Role::Excludes => "excludes",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
