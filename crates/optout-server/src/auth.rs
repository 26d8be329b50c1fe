use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Shared-secret gate for the cron trigger surface.
///
/// When `secret` is `None` the middleware is a transparent no-op: all
/// requests pass through, which is only sensible for local development.
/// With a secret set, every request must present it in the
/// `x-secure-cron` header or it is rejected before any work happens.
#[derive(Clone)]
pub struct CronAuth {
    pub secret: Option<String>,
}

impl CronAuth {
    /// No secret configured; middleware passes all requests through.
    pub fn none() -> Self {
        Self { secret: None }
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
        }
    }
}

pub async fn auth_middleware(
    State(auth): State<CronAuth>,
    req: Request,
    next: Next,
) -> Response {
    let Some(ref secret) = auth.secret else {
        return next.run(req).await;
    };

    let presented = req
        .headers()
        .get("x-secure-cron")
        .and_then(|v| v.to_str().ok());
    if presented == Some(secret.as_str()) {
        return next.run(req).await;
    }

    tracing::warn!(path = %req.uri().path(), "rejected request without valid cron secret");
    Response::builder()
        .status(401)
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"error":"unauthorized"}"#))
        .expect("infallible: all header values are valid ASCII")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
