pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use std::path::PathBuf;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use optout_core::config::AppConfig;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: state::AppState, cron: auth::CronAuth) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Everything under /api sits behind the shared-secret gate. The
    // liveness probe stays outside so schedulers can poll it blind.
    let api = Router::new()
        .route("/api/dispatch/send", post(routes::dispatch::send))
        .route("/api/sla/tick", post(routes::sla::tick))
        .route("/api/verify/sweep", post(routes::sweep::run))
        .route("/api/dlq", get(routes::dlq::list))
        .route("/api/dlq/export", get(routes::dlq::export))
        .route("/api/dlq/{id}/retry", post(routes::dlq::retry))
        .route("/api/proof/commit", post(routes::proof::commit))
        .route("/api/proof/export/{subject_id}", get(routes::proof::export))
        .route("/api/proof/{id}/verify", get(routes::proof::verify))
        .route("/api/actions", get(routes::actions::list))
        .route("/api/actions/{id}/cancel", post(routes::actions::cancel))
        .route("/api/status", get(routes::status::status))
        .layer(middleware::from_fn_with_state(cron, auth::auth_middleware));

    Router::new()
        .merge(api)
        .route("/healthz", get(routes::status::healthz))
        .layer(cors)
        .with_state(app_state)
}

/// Start the trigger server: load config from the data directory, open
/// the store, and serve until shutdown.
pub async fn serve(data_dir: PathBuf, port_override: Option<u16>) -> anyhow::Result<()> {
    let config = AppConfig::load(&data_dir)?;
    let port = port_override.unwrap_or(config.port);

    let cron = match config.cron_secret.clone() {
        Some(secret) => auth::CronAuth::with_secret(secret),
        None => {
            tracing::warn!("no cron secret configured, the trigger surface is open");
            auth::CronAuth::none()
        }
    };

    let app_state = state::AppState::new(data_dir, config)?;
    let app = build_router(app_state, cron);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("optout trigger server listening on http://localhost:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}
