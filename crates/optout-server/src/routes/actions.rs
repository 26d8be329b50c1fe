use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use optout_core::action;
use optout_core::types::ActionStatus;
use optout_core::OptoutError;

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize, Default)]
pub struct ListParams {
    #[serde(default)]
    pub status: Option<String>,
}

/// GET /api/actions: newest first, optionally filtered by status.
pub async fn list(
    State(app): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = params
        .status
        .as_deref()
        .map(ActionStatus::from_str)
        .transpose()?;

    let result = tokio::task::spawn_blocking(move || {
        let actions = app.store.list_actions(status)?;
        Ok::<_, OptoutError>(serde_json::to_value(&actions)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /api/actions/:id/cancel: operator kill switch for in-flight work.
pub async fn cancel(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let action = action::cancel(&app.store, id, Utc::now())?;
        Ok::<_, OptoutError>(serde_json::to_value(&action)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
