use thiserror::Error;

/// Core error types for cohort model operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid cohort definition: {message}")]
    InvalidDefinition { message: String },

    #[error("Duplicate id in cohort definition: {0}")]
    DuplicateId(String),

    #[error("Group not found: {role}/{id}")]
    GroupNotFound { role: String, id: String },
}

impl CoreError {
    /// Create a new InvalidDefinition error
    pub fn invalid_definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            message: message.into(),
        }
    }

    /// Create a new DuplicateId error
    pub fn duplicate_id(id: impl Into<String>) -> Self {
        Self::DuplicateId(id.into())
    }

    /// Create a new GroupNotFound error
    pub fn group_not_found(role: impl Into<String>, id: impl Into<String>) -> Self {
        Self::GroupNotFound {
            role: role.into(),
            id: id.into(),
        }
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::JsonError(_) => ErrorCategory::Serialization,
            Self::InvalidDefinition { .. } | Self::DuplicateId(_) => ErrorCategory::Validation,
            Self::GroupNotFound { .. } => ErrorCategory::NotFound,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Serialization,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_definition_error() {
        let err = CoreError::invalid_definition("missing includes");
        assert_eq!(err.to_string(), "Invalid cohort definition: missing includes");
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_group_not_found_error() {
        let err = CoreError::group_not_found("includes", "groups_abc");
        assert_eq!(err.to_string(), "Group not found: includes/groups_abc");
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CoreError = json_err.into();
        assert_eq!(err.category(), ErrorCategory::Serialization);
        assert!(err.to_string().starts_with("JSON serialization error"));
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Validation.to_string(), "validation");
        assert_eq!(ErrorCategory::NotFound.to_string(), "not_found");
        assert_eq!(ErrorCategory::Serialization.to_string(), "serialization");
    }
}
