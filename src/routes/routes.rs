//! Defines routes for the file store.
//!
//! ## Structure
//! - `GET    /healthz`        — liveness
//! - `GET    /readyz`         — readiness (disk probes)
//! - `PUT    /upload/{key}`   — upload a file
//! - `GET    /info/{key}`     — public metadata as JSON
//! - `GET    /{key}`          — download a file
//! - `DELETE /{key}`          — delete a file (needs its delete key)

use crate::handlers::{
    AppState,
    file_handlers::{delete_file, file_info, serve_file, upload_file},
    health_handlers::{healthz, readyz},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, put},
};

/// Build and return the router for all file routes.
///
/// Upload size is enforced by the backend, so axum's own body limit is off.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/upload/{key}", put(upload_file))
        .route("/info/{key}", get(file_info))
        .route("/{key}", get(serve_file).delete(delete_file))
        .layer(DefaultBodyLimit::disable())
}
