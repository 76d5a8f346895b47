//! HTTP surface for dataset creation, ingestion and finalization.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ddi_core::issue;
use ddi_core::{DataState, DatasetOwner, Issue, Pointer, Report};
use ddi_ingest::{DatasetService, IngestError, ServiceConfig};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{error, info};

pub const CRATE_NAME: &str = "ddi-web";

pub const CODE_JSON_MALFORMED: &str = "json-malformed";
pub const CODE_DATASET_ID_MISSING: &str = "dataset-id-missing";
pub const CODE_NOT_FOUND: &str = "resource-not-found";
pub const CODE_DATASET_CLOSED: &str = "dataset-closed";
pub const CODE_INTERNAL: &str = "internal-server-failure";

#[derive(Clone)]
pub struct AppState {
    pub service: DatasetService,
}

impl AppState {
    pub fn new(service: DatasetService) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize, Default)]
struct CreateDatasetQuery {
    #[serde(rename = "groupId")]
    group_id: Option<String>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/v1/users/{user_id}/datasets", post(create_dataset_handler))
        .route(
            "/v1/datasets/{dataset_id}",
            get(get_dataset_handler)
                .put(update_dataset_handler)
                .delete(delete_dataset_handler),
        )
        .route("/v1/datasets/{dataset_id}/data", post(add_dataset_data_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env();
    let service = DatasetService::from_config(&config).await?;
    let listener = TcpListener::bind(("0.0.0.0", config.web_port)).await?;
    info!(port = config.web_port, "listening");
    axum::serve(listener, app(AppState::new(service))).await?;
    Ok(())
}

async fn status_handler() -> Response {
    Json(json!({ "status": "ok", "service": CRATE_NAME })).into_response()
}

async fn create_dataset_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<CreateDatasetQuery>,
    body: Bytes,
) -> Response {
    let raw = match parse_body(&body) {
        Ok(raw) => raw,
        Err(err) => return error_response(err),
    };
    let owner = DatasetOwner {
        group_id: query.group_id.unwrap_or_else(|| user_id.clone()),
        user_id,
        by_user: None,
    };
    match state.service.create_dataset(owner, &raw).await {
        Ok(dataset) => (StatusCode::CREATED, Json(dataset)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_dataset_handler(State(state): State<Arc<AppState>>, Path(dataset_id): Path<String>) -> Response {
    match state.service.get_dataset(&dataset_id).await {
        Ok(dataset) => Json(dataset).into_response(),
        Err(err) => error_response(err),
    }
}

/// Only `{"dataState": "closed"}` is accepted; it finalizes the dataset.
async fn update_dataset_handler(
    State(state): State<Arc<AppState>>,
    Path(dataset_id): Path<String>,
    body: Bytes,
) -> Response {
    let raw = match parse_body(&body) {
        Ok(raw) => raw,
        Err(err) => return error_response(err),
    };
    if let Err(issues) = requested_close(&raw) {
        return error_response(IngestError::Invalid(issues));
    }
    match state.service.finalize_dataset(&dataset_id).await {
        Ok(dataset) => Json(dataset).into_response(),
        Err(err) => error_response(err),
    }
}

async fn delete_dataset_handler(State(state): State<Arc<AppState>>, Path(dataset_id): Path<String>) -> Response {
    match state.service.delete_dataset(&dataset_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

async fn add_dataset_data_handler(
    State(state): State<Arc<AppState>>,
    Path(dataset_id): Path<String>,
    body: Bytes,
) -> Response {
    let raw = match parse_body(&body) {
        Ok(raw) => raw,
        Err(err) => return error_response(err),
    };
    match state.service.add_dataset_data(&dataset_id, &raw).await {
        Ok(added) => Json(added).into_response(),
        Err(err) => error_response(err),
    }
}

fn parse_body(body: &Bytes) -> Result<Value, IngestError> {
    serde_json::from_slice(body).map_err(|err| IngestError::JsonMalformed(err.to_string()))
}

fn requested_close(raw: &Value) -> Result<(), Vec<Issue>> {
    let pointer = Pointer::root().child("dataState");
    let mut report = Report::new();
    match raw.get("dataState") {
        None | Some(Value::Null) => report.append(&pointer, issue::value_not_exists()),
        Some(Value::String(state)) if DataState::parse(state) == Some(DataState::Closed) => {}
        Some(Value::String(state)) => {
            report.append(&pointer, issue::value_not_one_of(state, &[DataState::Closed.as_str()]))
        }
        Some(other) => report.append(&pointer, issue::value_not_type("string", other)),
    }
    if report.is_empty() {
        Ok(())
    } else {
        Err(report.into_issues())
    }
}

fn error_response(err: IngestError) -> Response {
    let (status, issues) = match err {
        IngestError::Invalid(issues) => (StatusCode::BAD_REQUEST, issues),
        IngestError::JsonMalformed(detail) => (
            StatusCode::BAD_REQUEST,
            vec![Issue::new(CODE_JSON_MALFORMED, "json is malformed", detail)],
        ),
        IngestError::DatasetIdMissing => (
            StatusCode::BAD_REQUEST,
            vec![Issue::new(CODE_DATASET_ID_MISSING, "dataset id is missing", "dataset id is missing")],
        ),
        err @ IngestError::DatasetNotFound(_) => (
            StatusCode::NOT_FOUND,
            vec![Issue::new(CODE_NOT_FOUND, "resource not found", err.to_string())],
        ),
        err @ IngestError::DatasetClosed(_) => (
            StatusCode::CONFLICT,
            vec![Issue::new(CODE_DATASET_CLOSED, "dataset is closed", err.to_string())],
        ),
        err => {
            error!(error = %err, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                vec![Issue::new(CODE_INTERNAL, "internal server failure", err.to_string())],
            )
        }
    };
    (status, Json(json!({ "errors": issues }))).into_response()
}
