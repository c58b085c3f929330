//! Case analysis endpoint.
//!
//! `POST /api/v1/cases/analyze` accepts a CRM case, runs it through the
//! pipeline on its own task and maps every failure to a stable status code and
//! a user-safe error body. Dropping the handler future (client disconnect)
//! drops the cancel guard, which stops the upstream call.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use caserelay_core::domain::case::{CaseRequest, CaseResult};
use caserelay_core::errors::{ErrorKind, PipelineError};
use caserelay_gateway::{cancel_pair, CaseRuntime};
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Clone)]
pub struct CasesState {
    runtime: Arc<CaseRuntime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct RootMessage {
    pub message: String,
}

/// Error payload returned for every non-2xx response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error_kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn from_pipeline(error: &PipelineError, correlation_id: String) -> Self {
        Self {
            status: status_for(error),
            body: ErrorBody {
                error_kind: error.kind(),
                message: error.user_message(),
                field: error.field().map(str::to_string),
                correlation_id,
            },
        }
    }

    fn malformed_body(rejection: &JsonRejection, correlation_id: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error_kind: ErrorKind::ValidationError,
                message: format!("request body is not a valid case: {}", rejection.body_text()),
                field: None,
                correlation_id,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn status_for(error: &PipelineError) -> StatusCode {
    match error.kind() {
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
        ErrorKind::AuthError => StatusCode::UNAUTHORIZED,
        ErrorKind::RequestRejectedError => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::TransientGatewayError if error.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::TransientGatewayError | ErrorKind::ShapingError => StatusCode::BAD_GATEWAY,
        ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ConfigurationError | ErrorKind::InternalError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn router(runtime: Arc<CaseRuntime>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/v1/cases/analyze", post(analyze_case))
        .with_state(CasesState { runtime })
}

/// Liveness banner.
#[utoipa::path(
    get,
    path = "/",
    tag = "service",
    responses((status = 200, description = "Service is running", body = RootMessage))
)]
pub async fn root() -> Json<RootMessage> {
    Json(RootMessage { message: "caserelay API is running".to_string() })
}

/// Analyse a CRM case with the configured language model.
#[utoipa::path(
    post,
    path = "/api/v1/cases/analyze",
    tag = "cases",
    request_body = CaseRequest,
    params(
        ("x-request-id" = Option<String>, Header, description = "Correlation id echoed in results and errors")
    ),
    responses(
        (status = 200, description = "Case analysed", body = CaseResult),
        (status = 400, description = "Case failed validation", body = ErrorBody),
        (status = 401, description = "Upstream rejected the credential", body = ErrorBody),
        (status = 422, description = "Upstream rejected the derived request", body = ErrorBody),
        (status = 500, description = "Internal failure", body = ErrorBody),
        (status = 502, description = "Upstream unavailable or unusable output", body = ErrorBody),
        (status = 503, description = "Request cancelled", body = ErrorBody),
        (status = 504, description = "Upstream timed out", body = ErrorBody)
    )
)]
pub async fn analyze_case(
    State(state): State<CasesState>,
    headers: HeaderMap,
    payload: Result<Json<CaseRequest>, JsonRejection>,
) -> Result<Json<CaseResult>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let Json(case) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(
                event_name = "case.request.rejected",
                correlation_id = %correlation_id,
                reason = %rejection.body_text(),
                "case body could not be decoded"
            );
            return Err(ApiError::malformed_body(&rejection, correlation_id));
        }
    };

    let (handle, signal) = cancel_pair();
    let _cancel_on_drop = handle.drop_guard();
    let runtime = state.runtime.clone();
    let task_correlation_id = correlation_id.clone();
    let task =
        tokio::spawn(async move { runtime.process(&case, &task_correlation_id, signal).await });

    match task.await {
        Ok(Ok(result)) => Ok(Json(result)),
        Ok(Err(pipeline_error)) => Err(ApiError::from_pipeline(&pipeline_error, correlation_id)),
        Err(join_error) => {
            error!(
                event_name = "case.pipeline.aborted",
                correlation_id = %correlation_id,
                error = %join_error,
                "pipeline task did not complete"
            );
            let internal = PipelineError::Internal(join_error.to_string());
            Err(ApiError::from_pipeline(&internal, correlation_id))
        }
    }
}

pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
