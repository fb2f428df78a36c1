//! REST API handlers.
//!
//! Handlers only translate between HTTP and the components in `ApiState`;
//! every failure is returned as an [`ApiError`].

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use oms_core::{AppStatus, OperateRequest, Page, PageParam};
use oms_deploy::PackageUpload;
use oms_state::PackageRecord;
use serde::Deserialize;
use tracing::info;

use crate::ApiState;
use crate::error::ApiError;

/// Multipart field carrying the package file.
pub const UPLOAD_FILE_FIELD: &str = "uploadFile";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub app_key: Option<String>,
}

/// GET /oms/upgrade/status
pub async fn status(
    State(state): State<ApiState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<AppStatus>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let status = state.prober.status(query.app_key.as_deref()).await?;
    Ok(Json(status))
}

/// POST /oms/upgrade/operate
pub async fn operate(
    State(state): State<ApiState>,
    body: Result<Json<OperateRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    state.controller.operate_request(&req).await?;
    Ok(StatusCode::OK)
}

/// POST /oms/upgrade/uploadJar
///
/// Fields: `uploadFile` (the package), `type`, and optional `note`.
/// Unknown fields are skipped.
pub async fn upload_jar(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<StatusCode, ApiError> {
    let mut upload = PackageUpload::default();
    let mut has_file = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            UPLOAD_FILE_FIELD => {
                upload.file_name = field.file_name().unwrap_or_default().to_string();
                upload.bytes = field.bytes().await?.to_vec();
                has_file = true;
            }
            "type" => {
                upload.app_type = field.text().await?;
            }
            "note" => {
                upload.note = Some(field.text().await?);
            }
            _ => {}
        }
    }

    if !has_file {
        return Err(ApiError::BadRequest(format!("{UPLOAD_FILE_FIELD} is required")));
    }
    let record = state.packages.upload(upload).await?;
    info!(record_id = record.id, app_type = %record.app_type, "upload accepted");
    Ok(StatusCode::OK)
}

/// GET /oms/upgrade/page
pub async fn page(
    State(state): State<ApiState>,
    query: Result<Query<PageParam>, QueryRejection>,
) -> Result<Json<Page<PackageRecord>>, ApiError> {
    let Query(param) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(state.packages.page(param).await?))
}

/// POST /oms/upgrade/operate/{packageRecordId}
pub async fn upgrade(
    State(state): State<ApiState>,
    Path(package_record_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: u64 = package_record_id.trim().parse().map_err(|_| {
        ApiError::BadRequest(format!("invalid package record id {package_record_id:?}"))
    })?;
    let report = state.engine.upgrade(id).await?;
    info!(
        record_id = report.record_id,
        app_type = %report.app_type,
        merged_files = report.merged_files,
        "upgrade request completed"
    );
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::response::IntoResponse;
    use oms_deploy::{PackageStore, UpgradeEngine};
    use oms_health::StatusProber;
    use oms_process::{DryRunLauncher, ProcessController};
    use oms_state::{StateStore, StaticConfig};

    use super::*;

    fn test_state(os: &str) -> (ApiState, Arc<DryRunLauncher>) {
        let store = StateStore::open_in_memory().unwrap();
        let config = Arc::new(StaticConfig::default().with("WCS_ACCESS_URL", "http://127.0.0.1:8089"));
        let launcher = Arc::new(DryRunLauncher::default());
        let controller = Arc::new(ProcessController::new(launcher.clone()).with_os(os));
        let engine = UpgradeEngine::new(store.clone(), config.clone(), controller.clone());
        let state = ApiState {
            packages: PackageStore::new(store),
            engine: Arc::new(engine),
            controller,
            prober: StatusProber::new(config, 8089, Duration::from_millis(200)),
        };
        (state, launcher)
    }

    fn operate_body(app_key: &str, operate: &str) -> Result<Json<OperateRequest>, JsonRejection> {
        Ok(Json(OperateRequest {
            app_key: Some(app_key.to_string()),
            operate: Some(operate.to_string()),
        }))
    }

    #[tokio::test]
    async fn status_without_key_is_up() {
        let (state, _) = test_state("linux");
        let Json(status) = status(State(state), Ok(Query(StatusQuery::default())))
            .await
            .unwrap();
        assert_eq!(status, AppStatus::up());
    }

    #[tokio::test]
    async fn status_for_own_port_is_up() {
        let (state, _) = test_state("linux");
        let query = StatusQuery {
            app_key: Some("WCS".to_string()),
        };
        let Json(status) = status(State(state), Ok(Query(query))).await.unwrap();
        assert_eq!(status, AppStatus::up());
    }

    #[tokio::test]
    async fn status_unknown_app_is_bad_request() {
        let (state, _) = test_state("linux");
        let query = StatusQuery {
            app_key: Some("WMS".to_string()),
        };
        let err = status(State(state), Ok(Query(query))).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn operate_runs_command() {
        let (state, launcher) = test_state("linux");
        let code = operate(State(state), operate_body("WCS", "RESTART"))
            .await
            .unwrap();
        assert_eq!(code, StatusCode::OK);
        assert_eq!(launcher.commands(), vec!["sudo systemctl restart wcs"]);
    }

    #[tokio::test]
    async fn operate_on_unsupported_platform() {
        let (state, launcher) = test_state("macos");
        let err = operate(State(state), operate_body("WCS", "START"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(launcher.commands().is_empty());
    }

    #[tokio::test]
    async fn page_empty_store() {
        let (state, _) = test_state("linux");
        let Json(page) = page(State(state), Ok(Query(PageParam::default())))
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(page.records.is_empty());
    }

    #[tokio::test]
    async fn upgrade_rejects_non_numeric_id() {
        let (state, _) = test_state("linux");
        let err = upgrade(State(state), Path("abc".to_string())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upgrade_unknown_record_is_not_found() {
        let (state, launcher) = test_state("linux");
        let err = upgrade(State(state), Path("42".to_string())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(launcher.commands().is_empty());
    }
}
