use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use gamed_types::{
    BuildRequest, Context, GrainAddress, KEY_GRAIN_ID, KEY_TIMER_ID, ScheduleRequest,
    new_scheduler_grain_id,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::HostError;
use crate::http::HttpState;

pub const USER_ID_HEADER: &str = "X-User-Id";

pub fn router() -> Router<HttpState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/inventory", get(inventory_get))
        .route("/inventory/building", post(building_post))
        .route("/scheduler/timers", post(timers_post))
}

#[derive(Debug)]
enum ApiError {
    Unauthorized,
    Invalid(String),
    Host(HostError),
}

impl ApiError {
    fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::Invalid(msg.into())
    }
}

impl From<HostError> for ApiError {
    fn from(err: HostError) -> Self {
        ApiError::Host(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                format!("missing {USER_ID_HEADER} header"),
            ),
            ApiError::Invalid(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg),
            ApiError::Host(err) => {
                tracing::warn!("grain call failed: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "host_error", err.to_string())
            }
        };
        let body = serde_json::json!({ "code": code, "message": message });
        (status, Json(body)).into_response()
    }
}

fn user_id(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .map(|v| v.to_str().unwrap_or_default())
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::Unauthorized)?;
    Uuid::parse_str(raw).map_err(|e| ApiError::bad_request(format!("invalid user id: {e}")))
}

fn decode<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid body: {e}")))
}

async fn healthz() -> &'static str {
    "OK"
}

async fn inventory_get(
    State(state): State<HttpState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = user_id(&headers)?;
    let resp = state.host.inventory(user).await?.describe().await?;
    Ok(Json(Value::Object(resp.context)))
}

async fn building_post(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let user = user_id(&headers)?;
    let request: BuildRequest = decode(&body)?;
    let name = request.blueprint.as_deref().unwrap_or_default();
    if !state.host.registry().is_valid(name) {
        return Err(ApiError::bad_request(format!("unknown blueprint {name:?}")));
    }
    let resp = state.host.inventory(user).await?.start_build(request).await?;
    // Rejections such as insufficient resources travel in the body, not the status.
    Ok(Json(Value::Object(resp.context)))
}

#[derive(Debug, Deserialize)]
struct TimerBody {
    duration: String,
    #[serde(default)]
    reply: String,
    #[serde(default)]
    payload: Context,
    /// Reuse a scheduler from an earlier call instead of activating a new one.
    #[serde(default)]
    grain_id: Option<Uuid>,
}

async fn timers_post(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: TimerBody = decode(&body)?;
    let fresh = body.grain_id.is_none();
    let grain_id = body.grain_id.unwrap_or_else(new_scheduler_grain_id);
    let request = ScheduleRequest {
        duration: body.duration,
        reply: body.reply,
        payload: body.payload,
    };
    let resp = state.host.scheduler(grain_id).await?.schedule(request).await;
    let rejected = !matches!(&resp, Ok(resp) if resp.is_ok());
    if fresh && rejected {
        // Nothing was scheduled, so the activation made for this call has no work.
        let address = GrainAddress::scheduler(grain_id);
        if let Err(err) = state.host.deactivate(address).await {
            tracing::warn!(grain = %address, "failed to release scheduler: {err}");
        }
    }
    let resp = resp?;
    if let Some(err) = resp.error_message() {
        return Err(ApiError::bad_request(err));
    }
    let timer_id = resp.context.get(KEY_TIMER_ID).cloned().unwrap_or(Value::Null);
    let mut out = Context::new();
    out.insert(KEY_TIMER_ID.into(), timer_id);
    out.insert(KEY_GRAIN_ID.into(), Value::String(grain_id.to_string()));
    Ok(Json(Value::Object(out)))
}
