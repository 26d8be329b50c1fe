use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use optout_core::dispatch::Dispatcher;
use optout_core::dlq;
use optout_core::retry::ThreadSleeper;
use optout_core::OptoutError;

use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 100;

#[derive(serde::Deserialize, Default)]
pub struct ListParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /api/dlq: open entries, oldest first.
pub async fn list(
    State(app): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let result = tokio::task::spawn_blocking(move || {
        let entries = dlq::list(&app.store, limit)?;
        Ok::<_, OptoutError>(serde_json::to_value(&entries)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /api/dlq/:id/retry: push one parked entry back through delivery.
pub async fn retry(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let registry = app.registry()?;
        let dispatcher = Dispatcher::new(
            &app.store,
            &registry,
            app.mailer.as_ref(),
            app.forms.as_ref(),
            &ThreadSleeper,
            app.config.backoff.clone(),
            app.config.breaker.clone(),
        );
        let receipt = dlq::retry(&app.store, &registry, &dispatcher, id, Utc::now())?;
        Ok::<_, OptoutError>(serde_json::to_value(&receipt)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/dlq/export: open entries as CSV for operator triage.
pub async fn export(
    State(app): State<AppState>,
) -> Result<([(header::HeaderName, &'static str); 2], String), AppError> {
    let csv = tokio::task::spawn_blocking(move || dlq::export_csv(&app.store))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"dlq.csv\"",
            ),
        ],
        csv,
    ))
}
