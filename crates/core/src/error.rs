#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Upstream storage error: {0}")]
    UpstreamStorage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
