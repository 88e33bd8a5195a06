//! Video row model.

use sqlx::FromRow;
use vidcat_core::types::{DbId, Timestamp};
use vidcat_core::video::Video;

/// A row from the `videos` table.
#[derive(Debug, Clone, FromRow)]
pub struct VideoRow {
    pub id: DbId,
    pub media_ref: String,
    pub thumbnail_ref: String,
    pub title: String,
    pub description: String,
    pub duration_seconds: f64,
    pub views: i64,
    pub is_published: bool,
    pub owner_id: DbId,
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Video {
            id: row.id,
            media_ref: row.media_ref,
            thumbnail_ref: row.thumbnail_ref,
            title: row.title,
            description: row.description,
            duration_seconds: row.duration_seconds,
            views: row.views,
            is_published: row.is_published,
            owner_id: row.owner_id,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
