//! In-process stores backed by `RwLock`-guarded maps.
//!
//! Used by tests and for running the API without a database. Filters are
//! evaluated with [`Video::matches`], which defines the reference semantics
//! the PostgreSQL store mirrors.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::CoreError;
use crate::store::{OwnerDirectory, VideoStore};
use crate::types::{new_id, DbId};
use crate::video::{NewVideoRecord, OwnerView, StoreQuery, Video, VideoChanges};

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, CoreError> {
    lock.read()
        .map_err(|_| CoreError::Internal("In-memory store lock poisoned".into()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, CoreError> {
    lock.write()
        .map_err(|_| CoreError::Internal("In-memory store lock poisoned".into()))
}

// ---------------------------------------------------------------------------
// Videos
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryVideoStore {
    videos: RwLock<HashMap<DbId, Video>>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, published or not.
    pub fn len(&self) -> usize {
        self.videos.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn find(&self, query: &StoreQuery) -> Result<Vec<Video>, CoreError> {
        let videos = read(&self.videos)?;
        let mut matched: Vec<Video> = videos
            .values()
            .filter(|v| v.matches(&query.filter))
            .cloned()
            .collect();
        drop(videos);

        matched.sort_by(|a, b| a.compare_by(b, &query.sort));

        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Video>, CoreError> {
        Ok(read(&self.videos)?.get(&id).cloned())
    }

    async fn insert(&self, record: NewVideoRecord) -> Result<Video, CoreError> {
        let now = Utc::now();
        let video = Video {
            id: new_id(),
            media_ref: record.media_ref,
            thumbnail_ref: record.thumbnail_ref,
            title: record.title,
            description: record.description,
            duration_seconds: record.duration_seconds,
            views: record.views,
            is_published: record.is_published,
            owner_id: record.owner_id,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        write(&self.videos)?.insert(video.id, video.clone());
        Ok(video)
    }

    async fn update_by_id(
        &self,
        id: DbId,
        changes: &VideoChanges,
    ) -> Result<Option<Video>, CoreError> {
        let mut videos = write(&self.videos)?;
        let Some(video) = videos.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply_to(video);
        video.version += 1;
        video.updated_at = Utc::now();
        Ok(Some(video.clone()))
    }

    async fn delete_by_id(&self, id: DbId) -> Result<bool, CoreError> {
        Ok(write(&self.videos)?.remove(&id).is_some())
    }
}

// ---------------------------------------------------------------------------
// Owners
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryOwnerDirectory {
    owners: RwLock<HashMap<DbId, OwnerView>>,
}

impl MemoryOwnerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an owner.
    pub fn insert(&self, owner: OwnerView) {
        if let Ok(mut owners) = self.owners.write() {
            owners.insert(owner.id, owner);
        }
    }
}

#[async_trait]
impl OwnerDirectory for MemoryOwnerDirectory {
    async fn find_owners(&self, ids: &[DbId]) -> Result<Vec<OwnerView>, CoreError> {
        let owners = read(&self.owners)?;
        Ok(ids.iter().filter_map(|id| owners.get(id).cloned()).collect())
    }
}
