use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use casebook_core::{CaseError, RepositoryError, ValidationError};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Case(#[from] CaseError),
    #[error("authoring session not found: {0}")]
    SessionNotFound(Uuid),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        ApiError::Case(err.into())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Case(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Case(err) => match err {
                CaseError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CaseError::InvalidPath(_) | CaseError::InvalidValue { .. } => {
                    StatusCode::BAD_REQUEST
                }
                CaseError::InvalidTransition { .. } => StatusCode::CONFLICT,
                CaseError::NotFound(_) => StatusCode::NOT_FOUND,
                CaseError::Repository(_) => StatusCode::BAD_GATEWAY,
                CaseError::Deserialization { .. } | CaseError::Serialization(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

/// Errors are answered with the same envelope the expert agent uses:
/// `{"status": "error", "message": ...}`.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "request failed: {}", self);
        } else {
            tracing::debug!(status = status.as_u16(), "request refused: {}", self);
        }

        let body = json!({
            "status": "error",
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casebook_core::error::WorkflowAction;

    #[test]
    fn statuses_follow_the_error_kind() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (
                ValidationError::MissingTitle.into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CaseError::InvalidPath("patient.age".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                CaseError::InvalidTransition {
                    step: "select".into(),
                    action: WorkflowAction::Submit,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (CaseError::NotFound("c1".into()).into(), StatusCode::NOT_FOUND),
            (
                RepositoryError::http(500, "Internal Server Error").into(),
                StatusCode::BAD_GATEWAY,
            ),
            (ApiError::SessionNotFound(Uuid::nil()), StatusCode::NOT_FOUND),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err}");
        }
    }

    #[test]
    fn validation_message_is_passed_through() {
        let err: ApiError = ValidationError::MissingRejectionReason.into();
        assert_eq!(err.to_string(), "Veuillez saisir une raison pour le rejet.");
    }
}
