//! HTTP surface for the processing pipeline.
//!
//! A single synchronous request/response operation plus a health probe. The
//! optional shared-secret gate runs before anything else — when the config
//! carries a header name/value pair and the request's header does not match,
//! the request is rejected without invoking any collaborator.
//!
//! Status mapping follows the error taxonomy: caller-fault kinds (bad body,
//! unfetchable document) are 400, the auth gate is 401, and every pipeline
//! failure after validation is a 500 carrying the underlying cause's text for
//! diagnostics. The full context (stage, input) is in the logs.

use crate::config::ProcessingConfig;
use crate::error::ProcessError;
use crate::process::{process, ProcessRequest};
use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::error;

/// Error body returned for every non-200 response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Build the application router.
pub fn router(config: Arc<ProcessingConfig>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/invoices/process", post(process_invoice))
        .layer(ServiceBuilder::new())
        .with_state(config)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn process_invoice(
    State(config): State<Arc<ProcessingConfig>>,
    headers: HeaderMap,
    Json(request): Json<ProcessRequest>,
) -> Response {
    if let Err(e) = check_auth(config.expected_header.as_ref(), &headers) {
        return error_response(&e);
    }

    match process(&request, &config).await {
        Ok(output) => (StatusCode::OK, Json(output)).into_response(),
        Err(e) => {
            error!(error = %e, url = %request.document_url, "processing failed");
            error_response(&e)
        }
    }
}

/// Verify the static shared-secret header, when one is configured.
pub fn check_auth(
    expected: Option<&(String, String)>,
    headers: &HeaderMap,
) -> Result<(), ProcessError> {
    let Some((name, value)) = expected else {
        return Ok(());
    };
    let supplied = headers.get(name.as_str()).and_then(|v| v.to_str().ok());
    if supplied == Some(value.as_str()) {
        Ok(())
    } else {
        Err(ProcessError::Unauthorized)
    }
}

fn error_response(err: &ProcessError) -> Response {
    let status = match err {
        ProcessError::Unauthorized => StatusCode::UNAUTHORIZED,
        e if e.is_caller_fault() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}
