//! Repository for the `users` table (read side only).

use sqlx::PgPool;
use vidcat_core::types::DbId;

use crate::models::user::OwnerRow;

/// Public columns only; see [`OwnerRow`].
const OWNER_COLUMNS: &str = "id, username, email, full_name, avatar_url";

pub struct UserRepo;

impl UserRepo {
    /// Fetch the owner views for a batch of user ids.
    pub async fn find_owner_views(
        pool: &PgPool,
        ids: &[DbId],
    ) -> Result<Vec<OwnerRow>, sqlx::Error> {
        let query = format!("SELECT {OWNER_COLUMNS} FROM users WHERE id = ANY($1)");
        sqlx::query_as::<_, OwnerRow>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }
}
