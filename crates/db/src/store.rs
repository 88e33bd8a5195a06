//! PostgreSQL implementations of the core store ports.

use async_trait::async_trait;
use sqlx::PgPool;
use vidcat_core::error::CoreError;
use vidcat_core::store::{OwnerDirectory, VideoStore};
use vidcat_core::types::DbId;
use vidcat_core::video::{NewVideoRecord, OwnerView, StoreQuery, Video, VideoChanges};

use crate::repositories::{UserRepo, VideoRepo};

/// Log a database failure and surface it as an opaque internal error.
fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> CoreError {
    move |err| {
        tracing::error!(error = %err, operation, "Database error");
        CoreError::Internal(format!("Database error during {operation}"))
    }
}

/// [`VideoStore`] over the `videos` table.
#[derive(Clone)]
pub struct PgVideoStore {
    pool: PgPool,
}

impl PgVideoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoStore for PgVideoStore {
    async fn find(&self, query: &StoreQuery) -> Result<Vec<Video>, CoreError> {
        let rows = VideoRepo::find(&self.pool, query)
            .await
            .map_err(db_error("find videos"))?;
        Ok(rows.into_iter().map(Video::from).collect())
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Video>, CoreError> {
        let row = VideoRepo::find_by_id(&self.pool, id)
            .await
            .map_err(db_error("find video"))?;
        Ok(row.map(Video::from))
    }

    async fn insert(&self, record: NewVideoRecord) -> Result<Video, CoreError> {
        let row = VideoRepo::create(&self.pool, &record)
            .await
            .map_err(db_error("insert video"))?;
        Ok(row.into())
    }

    async fn update_by_id(
        &self,
        id: DbId,
        changes: &VideoChanges,
    ) -> Result<Option<Video>, CoreError> {
        let row = VideoRepo::update(&self.pool, id, changes)
            .await
            .map_err(db_error("update video"))?;
        Ok(row.map(Video::from))
    }

    async fn delete_by_id(&self, id: DbId) -> Result<bool, CoreError> {
        VideoRepo::delete(&self.pool, id)
            .await
            .map_err(db_error("delete video"))
    }
}

/// [`OwnerDirectory`] over the public columns of `users`.
#[derive(Clone)]
pub struct PgOwnerDirectory {
    pool: PgPool,
}

impl PgOwnerDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OwnerDirectory for PgOwnerDirectory {
    async fn find_owners(&self, ids: &[DbId]) -> Result<Vec<OwnerView>, CoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = UserRepo::find_owner_views(&self.pool, ids)
            .await
            .map_err(db_error("find owners"))?;
        Ok(rows.into_iter().map(OwnerView::from).collect())
    }
}
