//! Route handler functions for all API endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use wayfarer_chat::ChatOutcome;
use wayfarer_core::types::{AttractionsData, ExternalDataBag};

use crate::error::{ApiError, MESSAGE_REQUIRED};
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

/// Context block of a successful chat response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContext {
    /// Turns stored for the session before this message.
    pub message_count: usize,
    pub used_external_data: bool,
    pub destination: Option<String>,
    pub category: Option<String>,
    pub prompt_type: Option<String>,
    pub parsed_city: Option<String>,
    pub parsed_country: Option<String>,
    pub external_data: ExternalDataBag,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub success: bool,
    pub session_id: String,
    pub message: String,
    pub context: ChatContext,
    pub timestamp: DateTime<Utc>,
}

impl ChatResponse {
    fn from_outcome(session_id: String, outcome: ChatOutcome) -> Self {
        Self {
            success: true,
            session_id,
            message: outcome.reply,
            context: ChatContext {
                message_count: outcome.turn_count_before_reply,
                used_external_data: outcome.used_external_data,
                destination: outcome.destination,
                category: outcome.category.map(|c| c.as_str().to_string()),
                prompt_type: outcome.prompt_type.map(String::from),
                parsed_city: outcome.extracted_city,
                parsed_country: outcome.extracted_country,
                external_data: outcome.external_data,
            },
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AttractionsParams {
    pub destination: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttractionsResponse {
    pub success: bool,
    pub attractions: AttractionsData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

// =============================================================================
// Chat
// =============================================================================

/// Generate a session id for requests that do not bring one.
pub fn new_session_id() -> String {
    format!("session_{}", Uuid::new_v4())
}

/// POST /chat - answer one message within a session.
///
/// Body: `{ "message": string, "sessionId"?: string }`.
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(body) = body.map_err(|e| {
        tracing::debug!(error = %e, "Rejected chat body");
        ApiError::BadRequest(MESSAGE_REQUIRED.to_string())
    })?;

    let message = match body.get("message").and_then(Value::as_str) {
        Some(m) if !m.is_empty() => m,
        _ => return Err(ApiError::BadRequest(MESSAGE_REQUIRED.to_string())),
    };
    state.orchestrator.validate(message)?;

    let session_id = body
        .get("sessionId")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(new_session_id);

    let outcome = state.orchestrator.respond(message, &session_id, None).await;
    if outcome.error {
        return Err(ApiError::apology());
    }

    tracing::info!(
        session_id = %session_id,
        reply_chars = outcome.reply.len(),
        "Chat request completed"
    );
    Ok(Json(ChatResponse::from_outcome(session_id, outcome)))
}

// =============================================================================
// Attractions
// =============================================================================

/// GET /attractions?destination=... - points of interest near a destination.
pub async fn attractions(
    State(state): State<AppState>,
    Query(params): Query<AttractionsParams>,
) -> Result<Json<AttractionsResponse>, ApiError> {
    let destination = params
        .destination
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::BadRequest("destination is required".to_string()))?;

    let attractions = state
        .orchestrator
        .gateway()
        .get_attractions(destination)
        .await
        .ok_or_else(|| {
            ApiError::NotFound(format!("No attractions found for '{}'", destination))
        })?;

    Ok(Json(AttractionsResponse {
        success: true,
        attractions,
    }))
}

// =============================================================================
// Health
// =============================================================================

/// GET /health - liveness and basic counters.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.orchestrator.active_sessions(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_format() {
        let id = new_session_id();
        assert!(id.starts_with("session_"));
        assert!(Uuid::parse_str(&id["session_".len()..]).is_ok());
        assert_ne!(id, new_session_id());
    }
}
