use aps_issues::{ApsError, ErrorKind};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Aps(ApsError),
    ValidationError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Aps(err) => match err.kind() {
                ErrorKind::Auth => StatusCode::UNAUTHORIZED,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Provider => StatusCode::BAD_GATEWAY,
                ErrorKind::Config | ErrorKind::Export => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn kind_label(&self) -> serde_json::Value {
        match self {
            AppError::Aps(err) => json!(err.kind()),
            AppError::ValidationError(_) => json!("validation"),
        }
    }

    /// Mensagem exibida ao usuário
    pub fn user_message(&self) -> String {
        match self {
            AppError::Aps(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Aps(err) => write!(f, "APS error: {}", err),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<ApsError> for AppError {
    fn from(err: ApsError) -> Self {
        AppError::Aps(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": self.user_message(),
            "kind": self.kind_label(),
            "status": status.as_u16()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use aps_issues::AuthFailure;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApsError::config_error("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (AuthFailure::ThreeLeggedRequired.into(), StatusCode::UNAUTHORIZED),
            (ApsError::not_found("projeto"), StatusCode::NOT_FOUND),
            (ApsError::provider_error(Some(503), "fora do ar"), StatusCode::BAD_GATEWAY),
            (ApsError::export_error("disco cheio"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status_code(), expected);
        }
        assert_eq!(AppError::ValidationError("x".into()).status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_response_body_carries_kind_and_status() {
        let response = AppError::from(ApsError::from(AuthFailure::ThreeLeggedRequired)).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["kind"], "auth");
        assert_eq!(body["status"], 401);
        assert!(body["error"].as_str().unwrap().len() > 0);
    }
}
