#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use uuid::Uuid;

use jsonwebtoken::{encode, EncodingKey, Header};
use vidcat_api::auth::jwt::{Claims, JwtConfig};
use vidcat_api::config::ServerConfig;
use vidcat_api::routes;
use vidcat_api::state::AppState;
use vidcat_core::error::CoreError;
use vidcat_core::media::{ExternalRefId, MediaStore, UploadedMedia};
use vidcat_core::policy::VideoAccessPolicy;
use vidcat_core::store::{MemoryOwnerDirectory, MemoryVideoStore, VideoStore};
use vidcat_core::types::DbId;
use vidcat_core::video::{NewVideoRecord, OwnerView, Video};

const TEST_JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

/// Duration every fake upload reports.
pub const FAKE_DURATION: f64 = 12.5;

/// Build a test `ServerConfig` with safe defaults, staging uploads in
/// `upload_dir`.
pub fn test_config(upload_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        upload_dir: upload_dir.to_path_buf(),
        max_upload_bytes: 10 * 1024 * 1024,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Fake media store
// ---------------------------------------------------------------------------

/// Media store that records calls. Uploads consume the staged file the way
/// the real client does; a file whose content is `fail` is rejected.
#[derive(Default)]
pub struct RecordingMedia {
    pub uploads: Mutex<Vec<String>>,
    pub deletes: Mutex<Vec<ExternalRefId>>,
}

impl RecordingMedia {
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<ExternalRefId> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStore for RecordingMedia {
    async fn upload(&self, local_path: &Path) -> Result<UploadedMedia, CoreError> {
        let content = tokio::fs::read(local_path)
            .await
            .map_err(|e| CoreError::UpstreamStorage(e.to_string()))?;
        let _ = tokio::fs::remove_file(local_path).await;

        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if content == b"fail" {
            return Err(CoreError::UpstreamStorage("upload rejected".into()));
        }

        let kind = if name.ends_with(".mp4") { "video" } else { "image" };
        let url = format!("https://media.test/demo/{kind}/upload/v1/{name}");
        self.uploads.lock().unwrap().push(url.clone());
        Ok(UploadedMedia {
            url,
            duration_seconds: Some(FAKE_DURATION),
        })
    }

    async fn delete(&self, id: &ExternalRefId) -> Result<bool, CoreError> {
        self.deletes.lock().unwrap().push(id.clone());
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Everything a test needs to drive the app and inspect its collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryVideoStore>,
    pub owners: Arc<MemoryOwnerDirectory>,
    pub media: Arc<RecordingMedia>,
    pub config: ServerConfig,
    /// Keeps the staging directory alive for the test's duration.
    pub upload_dir: tempfile::TempDir,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Mint a 15-minute access token for `user_id`.
    pub fn token_for(&self, user_id: DbId) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            iat: now,
            exp: now + 15 * 60,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt.secret.as_bytes()),
        )
        .unwrap()
    }

    /// Register an owner in the directory and return its id.
    pub fn add_owner(&self, username: &str) -> DbId {
        let id = Uuid::new_v4();
        self.owners.insert(OwnerView {
            id,
            username: username.to_string(),
            email: format!("{username}@test.com"),
            full_name: format!("{username} tester"),
            avatar_url: None,
        });
        id
    }

    /// Insert a video directly into the store.
    pub async fn seed_video(&self, owner_id: DbId, title: &str, views: i64, published: bool) -> Video {
        let stem = Uuid::new_v4().simple().to_string();
        self.store
            .insert(NewVideoRecord {
                owner_id,
                media_ref: format!("https://media.test/demo/video/upload/v1/{stem}.mp4"),
                thumbnail_ref: format!("https://media.test/demo/image/upload/v1/{stem}.png"),
                duration_seconds: 30.0,
                title: title.to_string(),
                description: format!("About {title}"),
                is_published: published,
                views,
            })
            .await
            .unwrap()
    }

    /// Files still present in the staging directory.
    pub fn staged_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.upload_dir.path())
            .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
            .unwrap_or_default()
    }
}

/// Build the full application router over in-memory stores.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses.
pub fn build_test_app() -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let config = test_config(upload_dir.path());

    let store = Arc::new(MemoryVideoStore::new());
    let owners = Arc::new(MemoryOwnerDirectory::new());
    let media = Arc::new(RecordingMedia::default());

    let state = AppState {
        config: Arc::new(config.clone()),
        videos: VideoAccessPolicy::new(store.clone(), owners.clone(), media.clone()),
        pool: None,
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let router = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes(config.max_upload_bytes))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    TestApp {
        router,
        store,
        owners,
        media,
        config,
        upload_dir,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn send_auth(app: Router, method: Method, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send_auth(app, Method::GET, uri, token).await
}

/// One part of a multipart body.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

const BOUNDARY: &str = "vidcat-test-boundary";

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn multipart_auth(
    app: Router,
    method: Method,
    uri: &str,
    token: &str,
    parts: &[Part<'_>],
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
