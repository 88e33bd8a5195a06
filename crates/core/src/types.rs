use crate::error::CoreError;

/// All primary keys are UUIDs (v7 for new rows, so they sort by creation).
pub type DbId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Parse a client-supplied identifier.
///
/// Fails with [`CoreError::InvalidIdentifier`] for anything that is not a
/// well-formed UUID, so callers can reject bad ids before touching a store.
pub fn parse_id(raw: &str) -> Result<DbId, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidIdentifier("Identifier is required".into()));
    }
    uuid::Uuid::parse_str(trimmed)
        .map_err(|_| CoreError::InvalidIdentifier(format!("'{trimmed}' is not a valid id")))
}

/// Generate a fresh, time-ordered identifier.
pub fn new_id() -> DbId {
    uuid::Uuid::now_v7()
}
