use axum::extract::State;
use axum::Json;
use chrono::Utc;

use optout_core::sweep;
use optout_core::OptoutError;

use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_SWEEP_LIMIT: usize = 50;

#[derive(serde::Deserialize, Default)]
pub struct SweepBody {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// POST /api/verify/sweep: probe a bounded batch of in-flight actions.
pub async fn run(
    State(app): State<AppState>,
    body: Option<Json<SweepBody>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let limit = body
        .and_then(|Json(b)| b.limit)
        .unwrap_or(DEFAULT_SWEEP_LIMIT);

    let result = tokio::task::spawn_blocking(move || {
        let registry = app.registry()?;
        let report = sweep::run_verification_sweep(
            &app.store,
            &registry,
            app.probe.as_ref(),
            limit,
            Utc::now(),
        )?;
        Ok::<_, OptoutError>(serde_json::to_value(&report)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
