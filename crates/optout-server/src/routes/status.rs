use axum::extract::State;
use axum::Json;
use chrono::Utc;

use optout_core::{breaker, dlq, OptoutError};

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/status: action counts by status, open DLQ depth, and
/// per-controller breaker state.
pub async fn status(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let actions = app.store.count_actions_by_status()?;
        let dlq_open = dlq::open_count(&app.store)?;
        let breakers = breaker::state(&app.store, &app.config.breaker, Utc::now())?;
        Ok::<_, OptoutError>(serde_json::json!({
            "actions": actions,
            "dlq_open": dlq_open,
            "breakers": breakers,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /healthz: unauthenticated liveness probe.
pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}
