use axum::extract::State;
use axum::Json;
use chrono::Utc;

use optout_core::dispatch::{DispatchRequest, Dispatcher};
use optout_core::retry::ThreadSleeper;
use optout_core::subject::Subject;
use optout_core::OptoutError;

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct DispatchBody {
    pub controller_key: String,
    #[serde(default)]
    pub controller_name: Option<String>,
    pub subject: Subject,
    #[serde(default)]
    pub locale: Option<String>,
}

/// POST /api/dispatch/send: dispatch one removal request.
///
/// Delivery failures come back in-band as `{ok: false, ...}` receipts
/// with a 200; only validation and storage problems become error
/// statuses.
pub async fn send(
    State(app): State<AppState>,
    Json(body): Json<DispatchBody>,
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
        let request = DispatchRequest {
            controller_key: body.controller_key,
            controller_name: body.controller_name,
            subject: body.subject,
            locale: body.locale,
        };
        let receipt = dispatcher.dispatch(request, Utc::now())?;
        Ok::<_, OptoutError>(serde_json::to_value(&receipt)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
