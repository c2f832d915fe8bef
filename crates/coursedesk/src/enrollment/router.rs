use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::error;

use super::graph::GraphGateway;
use super::service::{EnrollmentService, SubmissionReceipt};
use super::store::{EnrollmentStore, StorageError};

/// Router builder exposing the enrollment intake and retrieval endpoints.
pub fn enrollment_router<S, G>(service: Arc<EnrollmentService<S, G>>) -> Router
where
    S: EnrollmentStore + 'static,
    G: GraphGateway + 'static,
{
    Router::new()
        .route("/api/enrollment", post(submit_handler::<S, G>))
        .route("/api/enrollments", get(list_handler::<S, G>))
        .route("/api/enrollments/download", get(download_handler::<S, G>))
        .with_state(service)
}

pub(crate) async fn submit_handler<S, G>(
    State(service): State<Arc<EnrollmentService<S, G>>>,
    axum::Json(payload): axum::Json<Value>,
) -> Response
where
    S: EnrollmentStore + 'static,
    G: GraphGateway + 'static,
{
    match service.submit(payload).await {
        Ok(SubmissionReceipt { record, storage }) => {
            let enrollment_id = record.id.0.clone();
            let body = json!({
                "success": true,
                "message": "Enrollment submitted successfully!",
                "enrollmentId": enrollment_id,
                "storage": storage,
                "data": record,
            });
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(validation) => {
            let body = json!({
                "success": false,
                "message": "Invalid enrollment data",
                "errors": validation.errors,
            });
            (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
        }
    }
}

pub(crate) async fn list_handler<S, G>(
    State(service): State<Arc<EnrollmentService<S, G>>>,
) -> Response
where
    S: EnrollmentStore + 'static,
    G: GraphGateway + 'static,
{
    match service.list().await {
        Ok(enrollments) => {
            let body = json!({
                "success": true,
                "count": enrollments.len(),
                "enrollments": enrollments,
            });
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(err) => {
            error!(%err, "failed to read enrollment archive");
            let body = json!({
                "success": false,
                "message": "Failed to retrieve enrollments",
                "error": err.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
        }
    }
}

pub(crate) async fn download_handler<S, G>(
    State(service): State<Arc<EnrollmentService<S, G>>>,
) -> Response
where
    S: EnrollmentStore + 'static,
    G: GraphGateway + 'static,
{
    match service.ledger().await {
        Ok(bytes) => {
            let filename = format!("enrollments_{}.csv", Utc::now().format("%Y-%m-%d"));
            let headers = [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ];
            (StatusCode::OK, headers, bytes).into_response()
        }
        Err(StorageError::NotFound) => {
            let body = json!({
                "success": false,
                "message": "No enrollment data found",
            });
            (StatusCode::NOT_FOUND, axum::Json(body)).into_response()
        }
        Err(err) => {
            error!(%err, "failed to read enrollment ledger");
            let body = json!({
                "success": false,
                "message": "Failed to download enrollment data",
                "error": err.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
        }
    }
}
