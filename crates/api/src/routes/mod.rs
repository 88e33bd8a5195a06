pub mod health;
pub mod video;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /videos                          list, publish (GET, POST)
/// /videos/{id}                     get, update, delete (GET, PATCH, DELETE)
/// /videos/toggle/publish/{id}      toggle publish state (PATCH)
///
/// /users/{id}/videos               list one owner's published videos (GET)
/// ```
///
/// Every route requires a Bearer token.
pub fn api_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .nest("/videos", video::router(max_upload_bytes))
        .nest("/users", video::owner_router())
}
