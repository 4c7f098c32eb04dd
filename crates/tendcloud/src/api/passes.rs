//! Reconciliation pass endpoints

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tendcloud_api::responses::{LastPassResponse, TriggerResponse};
use tendcloud_core::{GetLastPass, TriggerPass};
use tracing::info;

use crate::api::error::{ApiError, AppError};
use crate::state::AppState;

/// Result of the most recent finished pass
#[utoipa::path(
    get,
    path = "/passes/last",
    responses(
        (status = 200, description = "Last pass, absent before the first one finishes", body = LastPassResponse),
        (status = 500, description = "Controller unavailable", body = ApiError)
    ),
    tag = "passes"
)]
pub async fn last_pass(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let last = state
        .controller
        .ask(GetLastPass)
        .await
        .map_err(|e| AppError::internal(format!("failed to get last pass: {e}")))?;

    Ok(Json(LastPassResponse {
        in_flight: last.in_flight,
        result: last.result,
    }))
}

/// Start a pass now
#[utoipa::path(
    post,
    path = "/passes",
    responses(
        (status = 202, description = "Pass started", body = TriggerResponse),
        (status = 409, description = "A pass is already running", body = TriggerResponse),
        (status = 500, description = "Controller unavailable", body = ApiError)
    ),
    tag = "passes"
)]
pub async fn trigger(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let reply = state
        .controller
        .ask(TriggerPass)
        .await
        .map_err(|e| AppError::internal(format!("failed to trigger pass: {e}")))?;

    let status = if reply.started {
        info!("pass triggered over http");
        StatusCode::ACCEPTED
    } else {
        StatusCode::CONFLICT
    };
    Ok((
        status,
        Json(TriggerResponse {
            started: reply.started,
        }),
    ))
}
