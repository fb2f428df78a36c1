//! oms-api: REST API for OMS.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/oms/upgrade/status?appKey=` | Liveness of this service or a peer app |
//! | POST | `/oms/upgrade/operate` | Start, stop or restart an app |
//! | POST | `/oms/upgrade/uploadJar` | Upload a package (multipart) |
//! | GET | `/oms/upgrade/page?current=&size=` | Page through uploaded packages |
//! | POST | `/oms/upgrade/operate/{packageRecordId}` | Upgrade from a stored package |
//!
//! Successful status and page calls return bare JSON; the mutating calls
//! return an empty 200. Failures use `{"success": false, "error": "..."}`.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use oms_deploy::{PackageStore, UpgradeEngine};
use oms_health::StatusProber;
use oms_process::ProcessController;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Route prefix shared by every endpoint.
pub const BASE_PATH: &str = "/oms/upgrade";

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub packages: PackageStore,
    pub engine: Arc<UpgradeEngine>,
    pub controller: Arc<ProcessController>,
    pub prober: StatusProber,
}

/// Build the complete API router.
pub fn build_router(state: ApiState, max_upload_bytes: usize) -> Router {
    let routes = Router::new()
        .route("/status", get(handlers::status))
        .route("/operate", post(handlers::operate))
        .route("/uploadJar", post(handlers::upload_jar))
        .route("/page", get(handlers::page))
        .route("/operate/{package_record_id}", post(handlers::upgrade))
        .with_state(state);

    Router::new()
        .nest(BASE_PATH, routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}
