//! Video entity, its queryable field schema, and the DTOs flowing between
//! the access policy and the store.
//!
//! [`VideoField`] is the bridge from the schema-agnostic output of
//! [`crate::query`] to typed store queries: names are resolved, operands are
//! coerced to the field's type, and anything that does not fit is rejected
//! as [`CoreError::InvalidQuery`] before a store sees it.

use std::cmp::Ordering;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::query::{
    self, CompareOp, Document, Filter, FilterOp, FilterValue, ListQuery, Predicate, Projection,
    SortDirection, SortKey,
};
use crate::types::{DbId, Timestamp};

/// Entity name used in `NotFound` errors and log fields.
pub const ENTITY_VIDEO: &str = "Video";

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A stored video record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: DbId,
    /// External URL of the uploaded media file.
    pub media_ref: String,
    /// External URL of the thumbnail image.
    pub thumbnail_ref: String,
    pub title: String,
    pub description: String,
    pub duration_seconds: f64,
    pub views: i64,
    pub is_published: bool,
    pub owner_id: DbId,
    /// Store-managed revision counter, bumped on every write.
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Public view of a video's owner. Credentials, the refresh token, the
/// version counter and the user's timestamps are never part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerView {
    pub id: DbId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
}

/// A video as returned to clients, with the owner reference expanded.
///
/// `owner` is `None` when the referenced user no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoView {
    pub id: DbId,
    pub media_ref: String,
    pub thumbnail_ref: String,
    pub title: String,
    pub description: String,
    pub duration_seconds: f64,
    pub views: i64,
    pub is_published: bool,
    pub owner: Option<OwnerView>,
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl VideoView {
    pub fn new(video: Video, owner: Option<OwnerView>) -> Self {
        Self {
            id: video.id,
            media_ref: video.media_ref,
            thumbnail_ref: video.thumbnail_ref,
            title: video.title,
            description: video.description,
            duration_seconds: video.duration_seconds,
            views: video.views,
            is_published: video.is_published,
            owner,
            version: video.version,
            created_at: video.created_at,
            updated_at: video.updated_at,
        }
    }

    /// Serialize into a JSON document and apply `projection`.
    pub fn into_document(self, projection: &Projection) -> Result<Document, CoreError> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(doc)) => Ok(projection.apply(doc)),
            Ok(_) => Err(CoreError::Internal("Video did not serialize to an object".into())),
            Err(e) => Err(CoreError::Internal(format!("Failed to serialize video: {e}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Input to `create`: references to already-uploaded media.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVideo {
    pub media_ref: String,
    pub thumbnail_ref: String,
    pub duration_seconds: f64,
    pub title: String,
    pub description: String,
}

/// Input to `publish`: local files still to be uploaded.
#[derive(Debug, Clone, Default)]
pub struct PublishVideo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub media_path: Option<PathBuf>,
    pub thumbnail_path: Option<PathBuf>,
}

/// Partial update requested by the owner. `None` (or blank) keeps the
/// stored value.
#[derive(Debug, Clone, Default)]
pub struct VideoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Local path of a replacement thumbnail to upload.
    pub thumbnail_path: Option<PathBuf>,
}

/// Row handed to [`crate::store::VideoStore::insert`]. The store assigns
/// `id`, `version` and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVideoRecord {
    pub owner_id: DbId,
    pub media_ref: String,
    pub thumbnail_ref: String,
    pub duration_seconds: f64,
    pub title: String,
    pub description: String,
    pub is_published: bool,
    pub views: i64,
}

/// Field-wise changes handed to [`crate::store::VideoStore::update_by_id`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_ref: Option<String>,
    pub is_published: Option<bool>,
}

impl VideoChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.thumbnail_ref.is_none()
            && self.is_published.is_none()
    }

    /// Apply the changes in place (used by in-process stores).
    pub fn apply_to(&self, video: &mut Video) {
        if let Some(title) = &self.title {
            video.title = title.clone();
        }
        if let Some(description) = &self.description {
            video.description = description.clone();
        }
        if let Some(thumbnail_ref) = &self.thumbnail_ref {
            video.thumbnail_ref = thumbnail_ref.clone();
        }
        if let Some(is_published) = self.is_published {
            video.is_published = is_published;
        }
    }
}

// ---------------------------------------------------------------------------
// Field schema
// ---------------------------------------------------------------------------

/// Storage type of a queryable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Bool,
    Timestamp,
    Id,
}

/// Queryable video fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoField {
    Id,
    Title,
    Description,
    MediaRef,
    ThumbnailRef,
    DurationSeconds,
    Views,
    IsPublished,
    Owner,
    Version,
    CreatedAt,
    UpdatedAt,
}

impl VideoField {
    pub const ALL: &'static [VideoField] = &[
        Self::Id,
        Self::Title,
        Self::Description,
        Self::MediaRef,
        Self::ThumbnailRef,
        Self::DurationSeconds,
        Self::Views,
        Self::IsPublished,
        Self::Owner,
        Self::Version,
        Self::CreatedAt,
        Self::UpdatedAt,
    ];

    /// Canonical name, identical to the JSON key of [`VideoView`].
    pub fn key(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::Description => "description",
            Self::MediaRef => "mediaRef",
            Self::ThumbnailRef => "thumbnailRef",
            Self::DurationSeconds => "durationSeconds",
            Self::Views => "views",
            Self::IsPublished => "isPublished",
            Self::Owner => "owner",
            Self::Version => "version",
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Self::Title | Self::Description | Self::MediaRef | Self::ThumbnailRef => {
                FieldKind::Text
            }
            Self::DurationSeconds | Self::Views | Self::Version => FieldKind::Number,
            Self::IsPublished => FieldKind::Bool,
            Self::CreatedAt | Self::UpdatedAt => FieldKind::Timestamp,
            Self::Id | Self::Owner => FieldKind::Id,
        }
    }

    /// Resolve a client-supplied field name (canonical key or legacy alias).
    pub fn resolve(name: &str) -> Result<Self, CoreError> {
        let field = match name {
            "viewCount" => Self::Views,
            "ownerId" => Self::Owner,
            "videoFile" => Self::MediaRef,
            "thumbnail" => Self::ThumbnailRef,
            "duration" => Self::DurationSeconds,
            other => Self::ALL
                .iter()
                .copied()
                .find(|f| f.key() == other)
                .ok_or_else(|| CoreError::InvalidQuery(format!("Unknown field '{other}'")))?,
        };
        Ok(field)
    }
}

// ---------------------------------------------------------------------------
// Query resolution
// ---------------------------------------------------------------------------

/// A listing query resolved against the video schema, ready for a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub filter: Filter<VideoField>,
    pub sort: Vec<SortKey<VideoField>>,
    pub offset: u64,
    pub limit: u64,
}

/// Resolve a translated [`ListQuery`] into a [`StoreQuery`] plus the
/// canonicalised projection to apply to results.
pub fn resolve_list_query(query: ListQuery) -> Result<(StoreQuery, Projection), CoreError> {
    let filter = resolve_filter(query.filter)?;
    let sort = resolve_sort(query.sort)?;
    let projection = resolve_projection(&query.projection)?;
    Ok((
        StoreQuery {
            filter,
            sort,
            offset: query.window.offset,
            limit: query.window.limit,
        },
        projection,
    ))
}

/// Resolve field names and coerce operands to each field's type.
pub fn resolve_filter(filter: Filter<String>) -> Result<Filter<VideoField>, CoreError> {
    filter.try_map(&mut resolve_predicate)
}

fn resolve_predicate(pred: Predicate<String>) -> Result<Predicate<VideoField>, CoreError> {
    let field = VideoField::resolve(&pred.field)?;

    let op = match pred.op {
        FilterOp::Contains(text) if field.kind() == FieldKind::Text => FilterOp::Contains(text),
        // A plain value on a typed field means equality.
        FilterOp::Contains(text) => {
            FilterOp::Compare(CompareOp::Eq, coerce(field, FilterValue::Text(text))?)
        }
        FilterOp::Compare(op, value) => {
            if op.is_range() && !matches!(field.kind(), FieldKind::Number | FieldKind::Timestamp)
            {
                return Err(CoreError::InvalidQuery(format!(
                    "Operator '{}' is not supported on '{}'",
                    op.as_str(),
                    field.key()
                )));
            }
            FilterOp::Compare(op, coerce(field, value)?)
        }
    };

    Ok(Predicate { field, op })
}

fn coerce(field: VideoField, value: FilterValue) -> Result<FilterValue, CoreError> {
    let mismatch = |value: &FilterValue| {
        CoreError::InvalidQuery(format!(
            "Value {value:?} does not fit field '{}'",
            field.key()
        ))
    };

    let coerced = match (field.kind(), value) {
        (FieldKind::Text, v @ FilterValue::Text(_)) => v,
        (FieldKind::Number, v @ FilterValue::Number(_)) => v,
        (FieldKind::Bool, v @ FilterValue::Bool(_)) => v,
        (FieldKind::Timestamp, v @ FilterValue::Timestamp(_)) => v,
        (FieldKind::Id, v @ FilterValue::Id(_)) => v,
        (FieldKind::Number, FilterValue::Text(s)) => query::parse_number(&s)
            .map(FilterValue::Number)
            .ok_or_else(|| mismatch(&FilterValue::Text(s)))?,
        (FieldKind::Bool, FilterValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => FilterValue::Bool(true),
            "false" => FilterValue::Bool(false),
            _ => return Err(mismatch(&FilterValue::Text(s))),
        },
        (FieldKind::Timestamp, FilterValue::Text(s)) => query::parse_timestamp(&s)
            .map(FilterValue::Timestamp)
            .ok_or_else(|| mismatch(&FilterValue::Text(s)))?,
        (FieldKind::Id, FilterValue::Text(s)) => uuid::Uuid::parse_str(s.trim())
            .map(FilterValue::Id)
            .map_err(|_| mismatch(&FilterValue::Text(s)))?,
        (_, other) => return Err(mismatch(&other)),
    };
    Ok(coerced)
}

/// Resolve sort keys, appending `id` as a tie-breaker so that paging
/// through equal keys is stable.
pub fn resolve_sort(sort: Vec<SortKey<String>>) -> Result<Vec<SortKey<VideoField>>, CoreError> {
    let mut resolved = sort
        .into_iter()
        .map(|key| {
            Ok(SortKey {
                field: VideoField::resolve(&key.field)?,
                direction: key.direction,
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

    if !resolved.iter().any(|k| k.field == VideoField::Id) {
        resolved.push(SortKey {
            field: VideoField::Id,
            direction: SortDirection::Asc,
        });
    }
    Ok(resolved)
}

/// Canonicalise projection field names to [`VideoView`] keys.
pub fn resolve_projection(projection: &Projection) -> Result<Projection, CoreError> {
    let canonical = projection
        .fields()
        .iter()
        .map(|name| VideoField::resolve(name).map(|f| f.key().to_string()))
        .collect::<Result<_, CoreError>>()?;
    Ok(match projection {
        Projection::Include(_) => Projection::Include(canonical),
        Projection::Exclude(_) => Projection::Exclude(canonical),
    })
}

// ---------------------------------------------------------------------------
// In-process evaluation
// ---------------------------------------------------------------------------

impl Video {
    /// Current value of `field` as a filter operand.
    pub fn field_value(&self, field: VideoField) -> FilterValue {
        match field {
            VideoField::Id => FilterValue::Id(self.id),
            VideoField::Title => FilterValue::Text(self.title.clone()),
            VideoField::Description => FilterValue::Text(self.description.clone()),
            VideoField::MediaRef => FilterValue::Text(self.media_ref.clone()),
            VideoField::ThumbnailRef => FilterValue::Text(self.thumbnail_ref.clone()),
            VideoField::DurationSeconds => FilterValue::Number(self.duration_seconds),
            VideoField::Views => FilterValue::Number(self.views as f64),
            VideoField::IsPublished => FilterValue::Bool(self.is_published),
            VideoField::Owner => FilterValue::Id(self.owner_id),
            VideoField::Version => FilterValue::Number(f64::from(self.version)),
            VideoField::CreatedAt => FilterValue::Timestamp(self.created_at),
            VideoField::UpdatedAt => FilterValue::Timestamp(self.updated_at),
        }
    }

    /// Whether this record satisfies a resolved filter.
    pub fn matches(&self, filter: &Filter<VideoField>) -> bool {
        match filter {
            Filter::All(parts) => parts.iter().all(|p| self.matches(p)),
            Filter::Pred(pred) => {
                let value = self.field_value(pred.field);
                match (&pred.op, value) {
                    (FilterOp::Contains(needle), FilterValue::Text(hay)) => {
                        hay.to_lowercase().contains(&needle.to_lowercase())
                    }
                    (FilterOp::Contains(_), _) => false,
                    (FilterOp::Compare(op, operand), value) => {
                        compare_values(&value, operand).is_some_and(|ord| op.accepts(ord))
                    }
                }
            }
        }
    }

    /// Order two records by the given sort keys.
    pub fn compare_by(&self, other: &Video, sort: &[SortKey<VideoField>]) -> Ordering {
        for key in sort {
            let ord = compare_values(&self.field_value(key.field), &other.field_value(key.field))
                .unwrap_or(Ordering::Equal);
            let ord = match key.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

fn compare_values(a: &FilterValue, b: &FilterValue) -> Option<Ordering> {
    match (a, b) {
        (FilterValue::Text(a), FilterValue::Text(b)) => Some(a.cmp(b)),
        (FilterValue::Number(a), FilterValue::Number(b)) => a.partial_cmp(b),
        (FilterValue::Bool(a), FilterValue::Bool(b)) => Some(a.cmp(b)),
        (FilterValue::Timestamp(a), FilterValue::Timestamp(b)) => Some(a.cmp(b)),
        (FilterValue::Id(a), FilterValue::Id(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
