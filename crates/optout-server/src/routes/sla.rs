use axum::extract::State;
use axum::Json;
use chrono::Utc;

use optout_core::sla;
use optout_core::OptoutError;

use crate::error::AppError;
use crate::state::AppState;

/// POST /api/sla/tick: flag overdue sent actions for escalation.
pub async fn tick(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let registry = app.registry()?;
        let report = sla::run_sla_sweep(&app.store, &registry, Utc::now())?;
        Ok::<_, OptoutError>(serde_json::to_value(&report)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
