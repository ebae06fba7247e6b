use crate::analyzer::report::DailyReport;
use crate::config::Config;
use crate::db::Database;
use crate::portal::{CreateActivityRequest, PortalError, PortalService, ValidationError};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

const ERR_INVALID_REQUEST: &str = "ERR_INVALID_REQUEST";
const ERR_INVALID_OPERATION: &str = "ERR_INVALID_OPERATION";

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub portal: Arc<PortalService>,
}

impl ApiState {
    pub fn new(config: Arc<Config>) -> Self {
        let portal = Arc::new(PortalService::from_config(&config));
        Self { config, portal }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/portal", get(daily_reports))
        .route("/api/v1/portal/student", post(create_student_activity))
        .with_state(state)
}

/// Uniform body for every portal response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(message: Option<&str>, data: Option<T>) -> Self {
        Self {
            status_code: StatusCode::OK.as_u16(),
            message: message.map(str::to_string),
            data,
            error: None,
            error_code: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PortalQuery {
    #[serde(default)]
    student_id: String,
    date: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    service: &'static str,
    version: &'static str,
    api_port: u16,
    attendance_configured: bool,
    stored_activities: i64,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<ApiResponse<StatusPayload>>> {
    let database = Database::open(&state.config.db_path)?;

    let payload = StatusPayload {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        api_port: state.config.api_port,
        attendance_configured: state.config.resolve_attendance_base_url().is_some(),
        stored_activities: database.count_activities()?,
    };

    Ok(Json(ApiResponse::ok(None, Some(payload))))
}

async fn create_student_activity(
    State(state): State<ApiState>,
    payload: Result<Json<CreateActivityRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    state.portal.create_activity(&request)?;

    Ok(Json(ApiResponse::ok(
        Some("Student activity created successfully"),
        None,
    )))
}

async fn daily_reports(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<PortalQuery>,
) -> ApiResult<Json<ApiResponse<Vec<DailyReport>>>> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::BadRequest("token not found".to_string()))?;

    let reports = state
        .portal
        .daily_reports(&query.student_id, query.date.as_deref(), Some(token))
        .await?;

    Ok(Json(ApiResponse::ok(None, Some(reports))))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Validation(ValidationError),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<PortalError> for ApiError {
    fn from(value: PortalError) -> Self {
        match value {
            PortalError::Validation(error) => Self::Validation(error),
            PortalError::Internal(error) => Self::Internal(error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, error_code) = match self {
            ApiError::BadRequest(message) => {
                warn!(%message, "rejected portal request");
                (StatusCode::BAD_REQUEST, message, ERR_INVALID_REQUEST)
            }
            ApiError::Validation(error) => {
                warn!(error = %error, "portal request failed validation");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    error.to_string(),
                    ERR_INVALID_OPERATION,
                )
            }
            ApiError::Internal(error) => {
                error!(error = ?error, "portal request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("{error:#}"),
                    ERR_INVALID_OPERATION,
                )
            }
        };

        let body = ApiResponse::<()> {
            status_code: status.as_u16(),
            message: None,
            data: None,
            error: Some(message),
            error_code: Some(error_code),
        };

        (status, Json(body)).into_response()
    }
}
