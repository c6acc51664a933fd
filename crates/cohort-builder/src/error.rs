use cohort_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Cohort cannot be saved: {0}")]
    NotSaveable(String),
}

impl BuilderError {
    pub fn not_saveable(reason: impl Into<String>) -> Self {
        Self::NotSaveable(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, BuilderError>;
