use thiserror::Error;

/// Result type used across the study library.
pub type Result<T> = std::result::Result<T, StudyError>;

/// Error taxonomy for the study pipeline.
///
/// Duplicate* variants are raised by the storage layer when a UNIQUE
/// constraint rejects an insert, so callers can rely on them even when
/// two submissions race past the application-level pre-checks.
#[derive(Error, Debug)]
pub enum StudyError {
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: i64 },

    #[error("rater '{rater_id}' has already evaluated vignette {vignette_id}")]
    DuplicateEvaluation { rater_id: String, vignette_id: i64 },

    #[error("rater '{rater_id}' has already submitted demographics")]
    DuplicateDemographics { rater_id: String },

    #[error("no OpenRouter API key configured (set OPENROUTER_API_KEY)")]
    MissingCredential,

    #[error("model response failed validation: {0}")]
    SchemaValidation(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("admin authorization failed: {0}")]
    Unauthorized(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("llm request failed: {0}")]
    Llm(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
