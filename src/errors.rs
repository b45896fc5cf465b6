use thiserror::Error;

/// Use-case failure taxonomy. Infrastructure keeps returning
/// `anyhow::Result`; anything without a more specific meaning lands in
/// `Internal` (repository write failures, unexpected adapter errors).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("job not found: {0}")]
    JobNotFound(i64),

    #[error("application not found: {0}")]
    ApplicationNotFound(i64),

    #[error("{0}")]
    Validation(String),

    #[error("daily ingest cap reached ({used}/{limit})")]
    CapReached { used: i64, limit: i64 },

    #[error("{0}")]
    ProviderUnavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn provider(message: impl Into<String>) -> Self {
        AppError::ProviderUnavailable(message.into())
    }
}
