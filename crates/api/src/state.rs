use std::sync::Arc;

use vidcat_core::policy::VideoAccessPolicy;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; inner data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (JWT settings, upload staging directory).
    pub config: Arc<ServerConfig>,
    /// Access rules over the video store, owner directory and media store.
    pub videos: VideoAccessPolicy,
    /// Database pool, absent when running on the in-memory stores.
    pub pool: Option<vidcat_db::DbPool>,
}
