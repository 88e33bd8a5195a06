//! Restricted user projection used for owner expansion.

use sqlx::FromRow;
use vidcat_core::types::DbId;
use vidcat_core::video::OwnerView;

/// The public columns of a `users` row.
///
/// Credential and bookkeeping columns (`password_hash`, `refresh_token`,
/// `version`, timestamps) are never selected into this struct.
#[derive(Debug, Clone, FromRow)]
pub struct OwnerRow {
    pub id: DbId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
}

impl From<OwnerRow> for OwnerView {
    fn from(row: OwnerRow) -> Self {
        OwnerView {
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            avatar_url: row.avatar_url,
        }
    }
}
