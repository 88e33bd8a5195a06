//! External media references and the media-store port.
//!
//! Stored videos only hold URLs into the media store. Deleting the binary
//! content needs the store-relative identifier, which [`external_ref_id`]
//! derives from such a URL.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::error::CoreError;

/// Resource class of an uploaded asset, as encoded in delivery URLs
/// (`https://host/<cloud>/<kind>/upload/v<version>/<public_id>.<ext>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    Video,
    Raw,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Raw => "raw",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "raw" => Some(Self::Raw),
            _ => None,
        }
    }
}

/// Identifier of an asset inside the media store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRefId {
    pub kind: ResourceKind,
    pub public_id: String,
}

impl fmt::Display for ExternalRefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.public_id)
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedMedia {
    /// Delivery URL to persist on the record.
    pub url: String,
    /// Media duration, reported for audio/video uploads.
    pub duration_seconds: Option<f64>,
}

/// Binary media storage.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Upload a local file and return its delivery URL.
    async fn upload(&self, local_path: &Path) -> Result<UploadedMedia, CoreError>;

    /// Delete an asset. Returns `false` if the store did not know it.
    async fn delete(&self, id: &ExternalRefId) -> Result<bool, CoreError>;
}

/// Derive the media-store identifier from a stored delivery URL.
///
/// The public id is the last path segment without its extension. The
/// resource kind is the segment preceding `upload`, defaulting to image.
/// Any other URL shape is an error rather than a guess.
pub fn external_ref_id(url: &str) -> Result<ExternalRefId, CoreError> {
    let unexpected = |why: &str| {
        CoreError::UpstreamStorage(format!("Cannot derive media id from '{url}': {why}"))
    };

    let parsed = url::Url::parse(url.trim()).map_err(|_| unexpected("not a URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(unexpected("unsupported scheme"));
    }

    let segments: Vec<&str> = parsed
        .path_segments()
        .ok_or_else(|| unexpected("no path"))?
        .filter(|s| !s.is_empty())
        .collect();

    let last = segments.last().copied().ok_or_else(|| unexpected("no path"))?;
    let public_id = match last.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => last,
    };
    if public_id.is_empty() {
        return Err(unexpected("empty file name"));
    }

    let kind = segments
        .iter()
        .position(|s| *s == "upload")
        .and_then(|pos| pos.checked_sub(1))
        .and_then(|pos| ResourceKind::from_segment(segments[pos]))
        .unwrap_or(ResourceKind::Image);

    Ok(ExternalRefId {
        kind,
        public_id: public_id.to_string(),
    })
}
