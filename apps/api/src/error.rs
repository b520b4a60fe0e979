use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use civicvault_core::AppError;
use tracing::error;

mod types;

pub use types::ErrorResponse;

const GENERIC_DENIAL: &str = "access denied";
const GENERIC_FAILURE: &str = "request could not be completed";

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl ApiError {
    /// Status code and caller-facing message.
    ///
    /// Isolation failures never reveal whether the other tenant or record
    /// exists, so they collapse to fixed messages.
    fn status_and_message(&self) -> (StatusCode, String) {
        match &self.0 {
            AppError::Validation(_) | AppError::InvalidTenantId(_) | AppError::TenantMismatch(_) => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            AppError::TenantNotFound(_) => (StatusCode::NOT_FOUND, "tenant not found".to_owned()),
            AppError::Conflict(_) | AppError::DuplicateTenant(_) | AppError::InvalidTransition(_) => {
                (StatusCode::CONFLICT, self.0.to_string())
            }
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, self.0.to_string()),
            AppError::IsolationViolation(_) => (StatusCode::FORBIDDEN, GENERIC_DENIAL.to_owned()),
            AppError::TenantInactive(_) => (StatusCode::FORBIDDEN, "tenant is suspended".to_owned()),
            AppError::TenantMigrating(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "tenant is being migrated".to_owned(),
            ),
            AppError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, self.0.to_string()),
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, self.0.to_string()),
            AppError::TenantUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string())
            }
            AppError::PartialErasureFailure(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE.to_owned())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!(error = %self.0, status = status.as_u16(), "request failed");
        }

        let payload = Json(ErrorResponse::new(message, self.0.is_retriable()));
        (status, payload).into_response()
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;
