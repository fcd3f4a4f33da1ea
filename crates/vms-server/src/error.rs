//! Response envelope and error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use shared::VmsError;

/// `{ success, data, error }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::ok(data))))
}

pub fn created<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(data))))
}

/// Errors a handler can return
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Vms(VmsError),
}

impl From<VmsError> for AppError {
    fn from(err: VmsError) -> Self {
        AppError::Vms(err)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Vms(err) => match err {
                VmsError::NotFound(_) => StatusCode::NOT_FOUND,
                VmsError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                VmsError::InvalidTransition(_) | VmsError::Conflict(_) => StatusCode::CONFLICT,
                VmsError::Forbidden(_) => StatusCode::FORBIDDEN,
                VmsError::Platform(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::BadRequest(message) => message,
            AppError::Vms(err) => err.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{}", message);
        }
        (status, Json(ApiResponse::failure(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{InvalidTransitionError, NotFoundError};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (VmsError::from(NotFoundError::new("visit", "v-1")), StatusCode::NOT_FOUND),
            (VmsError::validation("email", "bad"), StatusCode::UNPROCESSABLE_ENTITY),
            (
                InvalidTransitionError::new("visit", "checked_out", "checked_in").into(),
                StatusCode::CONFLICT,
            ),
            (VmsError::Conflict("taken".into()), StatusCode::CONFLICT),
            (VmsError::Forbidden("blocked".into()), StatusCode::FORBIDDEN),
            (VmsError::Platform("503".into()), StatusCode::BAD_GATEWAY),
            (VmsError::Storage("poisoned".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status(), expected);
        }
        assert_eq!(AppError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_failure_envelope() {
        let body = serde_json::to_value(ApiResponse::failure("nope")).unwrap();
        assert_eq!(body["success"], false);
        assert!(body["data"].is_null());
        assert_eq!(body["error"], "nope");
    }
}
