use crate::assistant::{ Assistant, AssistantRequest };
use crate::models::chat::{ ChatRole, HistoryTurn };
use std::any::Any;
use std::num::NonZeroU32;
use std::sync::Arc;
use axum::{
    body::Bytes,
    routing::{ get, post },
    Router,
    extract::State,
    response::{ IntoResponse, Response },
    http::StatusCode,
    Json,
};
use governor::{ DefaultDirectRateLimiter, Quota, RateLimiter };
use serde::Serialize;
use serde_json::Value as JsonValue;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{ Any as AnyOrigin, CorsLayer };
use log::{ debug, error, warn };
use uuid::Uuid;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    topics: usize,
    ai: bool,
}

#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParsedAiHelperRequest {
    pub message: String,
    pub history: Vec<HistoryTurn>,
}

fn client_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

/// Keeps well-formed `{ role, text }` entries (text may also arrive as `content`)
/// and returns at most the last `limit` of them.
pub fn coerce_history(items: &[JsonValue], limit: usize) -> Vec<HistoryTurn> {
    let turns: Vec<HistoryTurn> = items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let role = obj
                .get("role")
                .and_then(|r| r.as_str())
                .and_then(ChatRole::from_label)?;
            let text = obj
                .get("text")
                .and_then(|t| t.as_str())
                .or_else(|| obj.get("content").and_then(|t| t.as_str()))
                .map(str::trim)
                .filter(|t| !t.is_empty())?;
            Some(HistoryTurn::new(role, text))
        })
        .collect();

    if turns.len() < items.len() {
        debug!("Dropped {} malformed history entries", items.len() - turns.len());
    }
    let skip = turns.len().saturating_sub(limit);
    turns.into_iter().skip(skip).collect()
}

pub fn parse_ai_helper_request(
    body: &[u8],
    history_limit: usize
) -> Result<ParsedAiHelperRequest, String> {
    let value: JsonValue = serde_json
        ::from_slice(body)
        .map_err(|e| format!("Request body must be valid JSON: {}", e))?;
    let obj = value.as_object().ok_or_else(|| "Request body must be a JSON object".to_string())?;

    let message = match obj.get("message") {
        Some(JsonValue::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(JsonValue::String(_)) => {
            return Err("`message` must not be empty".to_string());
        }
        Some(_) => {
            return Err("`message` must be a string".to_string());
        }
        None => {
            return Err("`message` is required".to_string());
        }
    };

    let history = match obj.get("conversationHistory") {
        Some(JsonValue::Array(items)) => coerce_history(items, history_limit),
        Some(JsonValue::Null) | None => Vec::new(),
        Some(_) => {
            debug!("Ignoring non-array conversationHistory");
            Vec::new()
        }
    };

    Ok(ParsedAiHelperRequest { message, history })
}

pub fn build_router(assistant: Arc<Assistant>, rate_limit_per_second: u32) -> Router {
    let limiter = NonZeroU32::new(rate_limit_per_second).map(|rate|
        Arc::new(RateLimiter::direct(Quota::per_second(rate)))
    );

    let panic_assistant = Arc::clone(&assistant);
    let on_panic = move |_err: Box<dyn Any + Send + 'static>| {
        error!("Assistant handler panicked; answering with the apology message");
        (StatusCode::OK, Json(panic_assistant.error_envelope(None))).into_response()
    };

    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    let app_state = AppState { assistant, limiter };

    Router::new()
        .route("/api/ai-helper", post(ai_helper_handler))
        .route("/api/health", get(health_handler))
        .layer(ServiceBuilder::new().layer(cors).layer(CatchPanicLayer::custom(on_panic)))
        .with_state(app_state)
}

async fn ai_helper_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4().to_string();

    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            warn!("[{}] Rate limit exceeded", request_id);
            return client_error(StatusCode::TOO_MANY_REQUESTS, "Too many requests, slow down");
        }
    }

    let parsed = match parse_ai_helper_request(&body, state.assistant.history_limit()) {
        Ok(p) => p,
        Err(msg) => {
            warn!("[{}] Rejected request: {}", request_id, msg);
            return client_error(StatusCode::BAD_REQUEST, msg);
        }
    };

    let request = AssistantRequest {
        request_id: request_id.clone(),
        message: parsed.message,
        history: parsed.history,
    };

    match state.assistant.respond(request).await {
        Ok(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
        Err(e) => {
            error!("[{}] Assistant failed: {}", request_id, e);
            let envelope = state.assistant.error_envelope(Some(e.language()));
            (StatusCode::OK, Json(envelope)).into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        topics: state.assistant.config().topics.len(),
        ai: state.assistant.ai_enabled(),
    })
}
