//! Route definitions for videos.
//!
//! ```text
//! GET    /videos                       list
//! POST   /videos                       publish (multipart)
//! GET    /videos/{id}                  get_by_id
//! PATCH  /videos/{id}                  update (multipart)
//! DELETE /videos/{id}                  delete
//! PATCH  /videos/toggle/publish/{id}   toggle_publish
//!
//! GET    /users/{id}/videos            list_by_owner
//! ```

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch};
use axum::Router;

use crate::handlers::video;
use crate::state::AppState;

/// Routes mounted at `/videos`. Upload bodies may be up to `max_upload_bytes`.
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(video::list).post(video::publish))
        .route("/toggle/publish/{id}", patch(video::toggle_publish))
        .route(
            "/{id}",
            get(video::get_by_id)
                .patch(video::update)
                .delete(video::delete),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// Routes mounted at `/users`.
pub fn owner_router() -> Router<AppState> {
    Router::new().route("/{id}/videos", get(video::list_by_owner))
}
