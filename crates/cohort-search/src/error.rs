use thiserror::Error;

/// Message shown when a remote call fails.
pub const REQUEST_FAILED_MESSAGE: &str =
    "Sorry, the request cannot be completed. Please try again or contact Support.";

/// Failure of the participant count procedure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CountError {
    #[error("Count request failed: {0}")]
    Remote(String),

    #[error("Count service unavailable")]
    Unavailable,
}

impl CountError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    pub fn user_message(&self) -> &'static str {
        REQUEST_FAILED_MESSAGE
    }
}

/// Failure of a criteria catalog lookup
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Catalog request failed: {0}")]
    Remote(String),

    #[error("Concept not found: {0}")]
    ConceptNotFound(i64),
}

impl CatalogError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    pub fn user_message(&self) -> &'static str {
        REQUEST_FAILED_MESSAGE
    }
}
