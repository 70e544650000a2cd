// HTTP route handlers for the sandcheck API

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use sandcheck_common::signature::{render_header, wrap_body};
use sandcheck_common::{ExecutionRequest, TypeTag, TypedParameter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::metrics;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(flatten)]
    pub request: ExecutionRequest,
    /// Treat `source` as a bare function body and add the header first.
    #[serde(default)]
    pub wrap_body: bool,
}

#[derive(Debug, Deserialize)]
pub struct SignatureRequest {
    pub parameters: Vec<TypedParameter>,
    pub return_type: TypeTag,
}

#[derive(Debug, Serialize)]
pub struct SignatureResponse {
    pub header: String,
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// POST /verify - Run a candidate against its test cases
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyRequest>,
) -> Response {
    let mut request = payload.request;

    if payload.wrap_body {
        match wrap_body(&request.source, &request.parameters, request.return_type) {
            Ok(source) => request.source = source,
            Err(e) => {
                warn!(error = %e, "Rejected body with invalid signature");
                return bad_request(e.to_string());
            }
        }
    }

    let start = Instant::now();
    let batch = state.verifier.verify(&request).await;
    metrics::record_batch(&batch, start.elapsed().as_secs_f64());

    info!(
        test_cases = batch.results.len(),
        passed = batch.passed_count(),
        all_passed = batch.all_passed,
        "Verification served"
    );

    (StatusCode::OK, Json(batch)).into_response()
}

/// POST /signature - Render the function header for a parameter list
pub async fn signature(Json(payload): Json<SignatureRequest>) -> Response {
    match render_header(&payload.parameters, payload.return_type) {
        Ok(header) => (StatusCode::OK, Json(SignatureResponse { header })).into_response(),
        Err(e) => bad_request(e.to_string()),
    }
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus exposition
pub async fn metrics() -> Response {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
