//! Persistence ports consumed by the access policy.
//!
//! - [`VideoStore`] -- document-style CRUD over video records.
//! - [`OwnerDirectory`] -- restricted owner lookups for expansion.
//!
//! Stores execute exactly the query they are given. Visibility rules and
//! owner expansion live in [`crate::policy::VideoAccessPolicy`], never here.

pub mod memory;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::DbId;
use crate::video::{NewVideoRecord, OwnerView, StoreQuery, Video, VideoChanges};

pub use memory::{MemoryOwnerDirectory, MemoryVideoStore};

#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Records matching `query.filter`, ordered and windowed.
    async fn find(&self, query: &StoreQuery) -> Result<Vec<Video>, CoreError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<Video>, CoreError>;

    /// Persist a new record; the store assigns id, version and timestamps.
    async fn insert(&self, record: NewVideoRecord) -> Result<Video, CoreError>;

    /// Apply field-wise changes. Returns `None` if the record is gone.
    async fn update_by_id(
        &self,
        id: DbId,
        changes: &VideoChanges,
    ) -> Result<Option<Video>, CoreError>;

    /// Returns `true` if a record was removed.
    async fn delete_by_id(&self, id: DbId) -> Result<bool, CoreError>;
}

#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    /// Owner views for the given ids. Unknown ids are simply absent.
    async fn find_owners(&self, ids: &[DbId]) -> Result<Vec<OwnerView>, CoreError>;
}
