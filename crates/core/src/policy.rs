//! Visibility and ownership rules for video records.
//!
//! Every client-facing read and write of a video goes through
//! [`VideoAccessPolicy`]. Listing always adds `isPublished = true` and
//! expands owners; direct lookups by id skip the published clause so owners
//! can edit unpublished videos; mutations require the caller to own the
//! record.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CoreError;
use crate::media::{external_ref_id, ExternalRefId, MediaStore};
use crate::query::{self, CompareOp, Document, Filter, FilterOp, FilterValue, QueryParams};
use crate::store::{OwnerDirectory, VideoStore};
use crate::types::{parse_id, DbId};
use crate::video::{
    resolve_list_query, NewVideo, NewVideoRecord, OwnerView, PublishVideo, Video, VideoChanges,
    VideoField, VideoPatch, VideoView, ENTITY_VIDEO,
};

/// Mediates all access to video records.
///
/// Cheap to clone; collaborators are shared behind `Arc`.
#[derive(Clone)]
pub struct VideoAccessPolicy {
    store: Arc<dyn VideoStore>,
    owners: Arc<dyn OwnerDirectory>,
    media: Arc<dyn MediaStore>,
}

impl VideoAccessPolicy {
    pub fn new(
        store: Arc<dyn VideoStore>,
        owners: Arc<dyn OwnerDirectory>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            store,
            owners,
            media,
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// List published videos matching the raw query-string parameters.
    ///
    /// The caller's filter can narrow the result but never widen it past
    /// the published clause.
    pub async fn list(&self, raw: &QueryParams) -> Result<Vec<Document>, CoreError> {
        self.list_scoped(raw, Filter::everything()).await
    }

    /// Like [`list`](Self::list), restricted to one owner's videos.
    pub async fn list_by_owner(
        &self,
        owner_id: DbId,
        raw: &QueryParams,
    ) -> Result<Vec<Document>, CoreError> {
        let scope = Filter::pred(
            VideoField::Owner,
            FilterOp::Compare(CompareOp::Eq, FilterValue::Id(owner_id)),
        );
        self.list_scoped(raw, scope).await
    }

    async fn list_scoped(
        &self,
        raw: &QueryParams,
        scope: Filter<VideoField>,
    ) -> Result<Vec<Document>, CoreError> {
        let (mut store_query, projection) = resolve_list_query(query::translate(raw)?)?;
        store_query.filter = store_query.filter.and(scope).and(published_only());

        let videos = self.store.find(&store_query).await?;
        tracing::debug!(
            count = videos.len(),
            offset = store_query.offset,
            limit = store_query.limit,
            "Listed videos"
        );

        self.expand_owners(videos)
            .await?
            .into_iter()
            .map(|view| view.into_document(&projection))
            .collect()
    }

    /// Fetch a video by id regardless of its publish state.
    pub async fn get_by_id(&self, raw_id: &str) -> Result<VideoView, CoreError> {
        let video = self.load(raw_id).await?;
        self.expand_one(video).await
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Persist a new, published video for `owner_id`.
    pub async fn create(&self, owner_id: DbId, input: NewVideo) -> Result<VideoView, CoreError> {
        let title = required_text(&input.title, "Title and description are required")?;
        let description = required_text(&input.description, "Title and description are required")?;
        let media_ref = required_text(&input.media_ref, "Video and thumbnail are required")?;
        let thumbnail_ref =
            required_text(&input.thumbnail_ref, "Video and thumbnail are required")?;
        if !input.duration_seconds.is_finite() || input.duration_seconds < 0.0 {
            return Err(CoreError::Validation(
                "Duration must be a non-negative number".into(),
            ));
        }

        let video = self
            .store
            .insert(NewVideoRecord {
                owner_id,
                media_ref,
                thumbnail_ref,
                duration_seconds: input.duration_seconds,
                title,
                description,
                is_published: true,
                views: 0,
            })
            .await?;
        tracing::info!(video_id = %video.id, owner_id = %owner_id, "Video created");

        self.expand_one(video).await
    }

    /// Upload the media and thumbnail files, then [`create`](Self::create)
    /// the record with the duration reported by the media store.
    pub async fn publish(
        &self,
        owner_id: DbId,
        input: PublishVideo,
    ) -> Result<VideoView, CoreError> {
        let (Some(title), Some(description)) = (
            non_blank(input.title),
            non_blank(input.description),
        ) else {
            return Err(CoreError::Validation(
                "Title and description are required".into(),
            ));
        };
        let (Some(media_path), Some(thumbnail_path)) = (input.media_path, input.thumbnail_path)
        else {
            return Err(CoreError::Validation(
                "Video and thumbnail are required".into(),
            ));
        };

        let media = self.media.upload(&media_path).await?;
        let thumbnail = match self.media.upload(&thumbnail_path).await {
            Ok(thumbnail) => thumbnail,
            Err(e) => {
                self.discard_upload(&media.url).await;
                return Err(e);
            }
        };

        let Some(duration_seconds) = media.duration_seconds else {
            self.discard_upload(&media.url).await;
            self.discard_upload(&thumbnail.url).await;
            return Err(CoreError::UpstreamStorage(
                "Media store did not report a duration for the video".into(),
            ));
        };

        self.create(
            owner_id,
            NewVideo {
                media_ref: media.url,
                thumbnail_ref: thumbnail.url,
                duration_seconds,
                title,
                description,
            },
        )
        .await
    }

    /// Apply a partial update on behalf of `caller_id`.
    ///
    /// A replacement thumbnail is uploaded first; only after that succeeds
    /// is the previous thumbnail deleted and the new URL persisted.
    pub async fn update(
        &self,
        raw_id: &str,
        caller_id: DbId,
        patch: VideoPatch,
    ) -> Result<VideoView, CoreError> {
        let video = self.load_owned(raw_id, caller_id, "update").await?;

        let mut changes = VideoChanges {
            title: non_blank(patch.title),
            description: non_blank(patch.description),
            ..Default::default()
        };

        if let Some(path) = patch.thumbnail_path {
            let uploaded = self.media.upload(&path).await?;

            let previous = match external_ref_id(&video.thumbnail_ref) {
                Ok(id) => id,
                Err(e) => {
                    self.discard_upload(&uploaded.url).await;
                    return Err(e);
                }
            };
            if let Err(e) = self.delete_asset(&previous).await {
                self.discard_upload(&uploaded.url).await;
                return Err(e);
            }

            changes.thumbnail_ref = Some(uploaded.url);
        }

        if changes.is_empty() {
            return self.expand_one(video).await;
        }

        let updated = self
            .store
            .update_by_id(video.id, &changes)
            .await?
            .ok_or_else(|| not_found(video.id))?;
        tracing::info!(video_id = %updated.id, "Video updated");

        self.expand_one(updated).await
    }

    /// Delete a video and both of its media assets.
    ///
    /// Both asset ids are derived before anything is deleted, so a stored
    /// URL of unexpected shape leaves the record and its media untouched.
    pub async fn delete(&self, raw_id: &str, caller_id: DbId) -> Result<(), CoreError> {
        let video = self.load_owned(raw_id, caller_id, "delete").await?;

        let media_id = external_ref_id(&video.media_ref)?;
        let thumbnail_id = external_ref_id(&video.thumbnail_ref)?;

        self.delete_asset(&media_id).await?;
        self.delete_asset(&thumbnail_id).await?;

        if !self.store.delete_by_id(video.id).await? {
            return Err(not_found(video.id));
        }
        tracing::info!(video_id = %video.id, "Video deleted");
        Ok(())
    }

    /// Flip the publish flag on behalf of `caller_id`.
    pub async fn toggle_publish(
        &self,
        raw_id: &str,
        caller_id: DbId,
    ) -> Result<VideoView, CoreError> {
        let video = self.load_owned(raw_id, caller_id, "modify").await?;

        let changes = VideoChanges {
            is_published: Some(!video.is_published),
            ..Default::default()
        };
        let updated = self
            .store
            .update_by_id(video.id, &changes)
            .await?
            .ok_or_else(|| not_found(video.id))?;
        tracing::info!(
            video_id = %updated.id,
            is_published = updated.is_published,
            "Video publish state toggled"
        );

        self.expand_one(updated).await
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn load(&self, raw_id: &str) -> Result<Video, CoreError> {
        let id = parse_id(raw_id)?;
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    async fn load_owned(
        &self,
        raw_id: &str,
        caller_id: DbId,
        action: &str,
    ) -> Result<Video, CoreError> {
        let video = self.load(raw_id).await?;
        if video.owner_id != caller_id {
            tracing::warn!(
                video_id = %video.id,
                caller_id = %caller_id,
                action,
                "Rejected mutation by non-owner"
            );
            return Err(CoreError::Forbidden(format!(
                "You are not allowed to {action} this video"
            )));
        }
        Ok(video)
    }

    async fn expand_owners(&self, videos: Vec<Video>) -> Result<Vec<VideoView>, CoreError> {
        let mut ids: Vec<DbId> = videos.iter().map(|v| v.owner_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let owners: HashMap<DbId, OwnerView> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.owners
                .find_owners(&ids)
                .await?
                .into_iter()
                .map(|o| (o.id, o))
                .collect()
        };

        Ok(videos
            .into_iter()
            .map(|video| {
                let owner = owners.get(&video.owner_id).cloned();
                VideoView::new(video, owner)
            })
            .collect())
    }

    async fn expand_one(&self, video: Video) -> Result<VideoView, CoreError> {
        self.expand_owners(vec![video])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Internal("Owner expansion dropped a video".into()))
    }

    async fn delete_asset(&self, id: &ExternalRefId) -> Result<(), CoreError> {
        if !self.media.delete(id).await? {
            tracing::warn!(public_id = %id, "Media store had no asset to delete");
        }
        Ok(())
    }

    /// Best-effort removal of an asset uploaded by a failed operation.
    async fn discard_upload(&self, url: &str) {
        let result = match external_ref_id(url) {
            Ok(id) => self.media.delete(&id).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(url, error = %e, "Failed to discard orphaned upload");
        }
    }
}

fn published_only() -> Filter<VideoField> {
    Filter::pred(
        VideoField::IsPublished,
        FilterOp::Compare(CompareOp::Eq, FilterValue::Bool(true)),
    )
}

fn not_found(id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: ENTITY_VIDEO,
        id: id.to_string(),
    }
}

fn required_text(value: &str, message: &str) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(message.to_string()));
    }
    Ok(trimmed.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
