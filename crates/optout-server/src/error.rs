use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use optout_core::error::OptoutError;

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(OptoutError::InvalidStatus(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if let Some(e) = self.0.downcast_ref::<OptoutError>() {
            match e {
                OptoutError::UnknownController(_)
                | OptoutError::ProofNotFound(_)
                | OptoutError::ActionNotFound(_)
                | OptoutError::DlqEntryNotFound(_) => StatusCode::NOT_FOUND,
                OptoutError::InvalidSubject(_)
                | OptoutError::InvalidEvidenceHash(_)
                | OptoutError::EmptyEvidenceSet => StatusCode::UNPROCESSABLE_ENTITY,
                OptoutError::NoHandlerFound(_)
                | OptoutError::MissingEndpoint { .. }
                | OptoutError::DlqEntryResolved(_)
                | OptoutError::ActionCancelled(_)
                | OptoutError::InvalidTransition { .. } => StatusCode::CONFLICT,
                OptoutError::InvalidControllerKey(_)
                | OptoutError::InvalidStatus(_)
                | OptoutError::InvalidChannel(_) => StatusCode::BAD_REQUEST,
                OptoutError::SigningKeyInvalid(_)
                | OptoutError::Bundle(_)
                | OptoutError::Transport(_)
                | OptoutError::Store(_)
                | OptoutError::Io(_)
                | OptoutError::Yaml(_)
                | OptoutError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn unknown_controller_maps_to_404() {
        let err = AppError(OptoutError::UnknownController("mystery".into()).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn action_not_found_maps_to_404() {
        let err = AppError(OptoutError::ActionNotFound("a-1".into()).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn proof_not_found_maps_to_404() {
        let err = AppError(OptoutError::ProofNotFound("p-1".into()).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn dlq_entry_not_found_maps_to_404() {
        let err = AppError(OptoutError::DlqEntryNotFound("d-1".into()).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_subject_maps_to_422() {
        let err = AppError(OptoutError::InvalidSubject("missing email".into()).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn empty_evidence_set_maps_to_422() {
        let err = AppError(OptoutError::EmptyEvidenceSet.into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn missing_endpoint_maps_to_409() {
        let err = AppError(
            OptoutError::MissingEndpoint {
                controller: "spokeo".into(),
                channel: "webform".into(),
            }
            .into(),
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn dlq_entry_resolved_maps_to_409() {
        let err = AppError(OptoutError::DlqEntryResolved("d-1".into()).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn action_cancelled_maps_to_409() {
        let err = AppError(OptoutError::ActionCancelled("a-1".into()).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_transition_maps_to_409() {
        let err = AppError(
            OptoutError::InvalidTransition {
                from: "resolved".into(),
                to: "cancelled".into(),
            }
            .into(),
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_controller_key_maps_to_400() {
        let err = AppError(OptoutError::InvalidControllerKey("Bad Key".into()).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_status_maps_to_400() {
        let err = AppError(OptoutError::InvalidStatus("sentish".into()).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_error_maps_to_500() {
        let err = AppError(OptoutError::Store("table corrupted".into()).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn non_core_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn response_body_is_json_with_error_field() {
        let err = AppError(OptoutError::ActionNotFound("a-9".into()).into());
        let response = err.into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
