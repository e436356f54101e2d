//! HTTP boundary: Telegram webhook receiver, app polling endpoint, health.

mod error;

pub use error::ApiError;

use crate::config::UpdateMode;
use crate::verification::{PollOutcome, VerificationService};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use teloxide::types::Update;

pub const WEBHOOK_SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Receives parsed webhook updates and routes them to the bot handlers.
#[async_trait]
pub trait UpdateSink: Send + Sync {
    async fn dispatch(&self, update: Update) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct ApiState {
    pub secret: Arc<str>,
    pub mode: UpdateMode,
    pub verification: Arc<VerificationService>,
    /// `None` when the bot could not be initialised.
    pub updates: Option<Arc<dyn UpdateSink>>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/bot", post(webhook))
        .route("/check_join", get(check_join))
        .route("/health", get(health))
        .with_state(state)
}

async fn webhook(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let provided = headers
        .get(WEBHOOK_SECRET_HEADER)
        .map(|value| value.as_bytes())
        .unwrap_or_default();
    if !secret_matches(provided, &state.secret) {
        tracing::warn!("Webhook call with invalid secret header");
        return Err(ApiError::Unauthorized);
    }

    let Some(updates) = state.updates.as_ref() else {
        tracing::error!("Webhook update received but the bot is not initialized");
        return Err(ApiError::NotReady);
    };

    // Always acknowledge from here on so Telegram does not redeliver.
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(error) => {
            tracing::error!(error = %error, "Failed to parse webhook update");
            return Ok(Json(json!({ "message": "Error" })));
        }
    };
    let update_id = update.id.0;

    match updates.dispatch(update).await {
        Ok(()) => Ok(Json(json!({ "message": "OK" }))),
        Err(error) => {
            tracing::error!(update_id = update_id, error = %error, "Error processing update");
            Ok(Json(json!({ "message": "Error" })))
        }
    }
}

/// Constant-time comparison against the shared API secret.
fn secret_matches(provided: &[u8], secret: &str) -> bool {
    bool::from(provided.ct_eq(secret.as_bytes()))
}

#[derive(Debug, Deserialize)]
struct CheckJoinParams {
    app_id: String,
    secret: String,
}

async fn check_join(
    State(state): State<ApiState>,
    Query(params): Query<CheckJoinParams>,
) -> Result<Json<Value>, ApiError> {
    if !secret_matches(params.secret.as_bytes(), &state.secret) {
        tracing::warn!(app_id = %params.app_id, "check_join with invalid secret");
        return Err(ApiError::Forbidden);
    }

    let outcome = state.verification.poll(params.app_id.trim()).await;
    if outcome == PollOutcome::Unclaimed {
        tracing::debug!(app_id = %params.app_id, "check_join for unclaimed app_id");
    }
    Ok(Json(json!({ "verified": outcome.verified() })))
}

async fn health(State(state): State<ApiState>) -> Json<Value> {
    let sessions = state.verification.registry().len().await;
    Json(json!({
        "status": "ok",
        "sessions": sessions,
        "mode": state.mode.as_str(),
    }))
}
