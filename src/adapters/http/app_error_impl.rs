use crate::application::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        tracing::error!(error = ?self, "Request failed");

        match self {
            AppError::Database(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError, None)
            }
            AppError::Config(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::ConfigError, None)
            }
            AppError::InvalidInput(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput, Some(msg))
            }
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::Unauthorized => {
                error_resp(StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, None)
            }
            AppError::SignatureMismatch => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::SignatureMismatch, None)
            }
            AppError::ReceiptMismatch(_) => error_resp(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::ReceiptMismatch,
                None,
            ),
            AppError::InvoiceCollision => {
                error_resp(StatusCode::CONFLICT, ErrorCode::InvoiceCollision, None)
            }
            AppError::InvoiceAllocationExhausted(_) => error_resp(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InvoiceAllocationExhausted,
                None,
            ),
            AppError::ParentPaymentPending => {
                error_resp(StatusCode::CONFLICT, ErrorCode::ParentPaymentPending, None)
            }
            AppError::GatewayTransport(_) => {
                error_resp(StatusCode::BAD_GATEWAY, ErrorCode::GatewayTransport, None)
            }
            AppError::GatewayRejected(msg) => error_resp(
                StatusCode::BAD_GATEWAY,
                ErrorCode::GatewayRejected,
                Some(msg),
            ),
            AppError::Internal(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, None)
            }
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
