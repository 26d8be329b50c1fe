use axum::extract::{Path, State};
use axum::http::header;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use optout_core::{bundle, ledger, OptoutError};

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct CommitBody {
    pub subject_id: String,
    pub evidence_hashes: Vec<String>,
    #[serde(default)]
    pub controller_key: Option<String>,
}

/// POST /api/proof/commit: seal an evidence set into a signed Merkle root.
pub async fn commit(
    State(app): State<AppState>,
    Json(body): Json<CommitBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let signer = app.signer()?;
        let record = ledger::commit(
            &app.store,
            &signer,
            &body.subject_id,
            &body.evidence_hashes,
            body.controller_key.as_deref(),
            Utc::now(),
        )?;
        Ok::<_, OptoutError>(serde_json::to_value(&record)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/proof/:id/verify: recompute the root and check the signature.
pub async fn verify(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let signer = app.signer()?;
        let check = ledger::verify(&app.store, &signer, id)?;
        Ok::<_, OptoutError>(serde_json::to_value(&check)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/proof/export/:subject_id: offline-verifiable zip bundle.
pub async fn export(
    State(app): State<AppState>,
    Path(subject_id): Path<String>,
) -> Result<([(header::HeaderName, &'static str); 2], Vec<u8>), AppError> {
    let bytes = tokio::task::spawn_blocking(move || {
        bundle::export_bundle(&app.store, &subject_id, Utc::now())
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"proof-bundle.zip\"",
            ),
        ],
        bytes,
    ))
}
