//! Gateway-facing endpoints: the result callback plus the user-facing
//! success/fail landing pages.
//!
//! The result endpoint speaks the gateway's plain-text acknowledgment
//! protocol, not the JSON error envelope: success is the literal
//! `OK{InvId}`, every failure body starts with `ERROR`.

use axum::{
    Form, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::warn;

use crate::{
    adapters::http::app_state::AppState,
    application::{app_error::AppError, use_cases::callback::CallbackParams},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/result", post(result_callback))
        .route("/success", get(success_landing))
        .route("/fail", get(fail_landing))
}

/// POST /api/robokassa/result
/// Asynchronous payment notification from the gateway.
async fn result_callback(
    State(app_state): State<AppState>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    let params = match parse_callback(&fields) {
        Ok(params) => params,
        Err(msg) => {
            warn!(error = msg, "Malformed result callback");
            return error_body(StatusCode::BAD_REQUEST, msg);
        }
    };

    match app_state.callback_use_cases.process(params).await {
        Ok(ack) => (StatusCode::OK, ack).into_response(),
        Err(AppError::SignatureMismatch) => {
            error_body(StatusCode::BAD_REQUEST, "Invalid signature")
        }
        Err(AppError::NotFound) => error_body(StatusCode::NOT_FOUND, "unknown invoice"),
        Err(AppError::InvalidInput(msg)) => error_body(StatusCode::BAD_REQUEST, &msg),
        Err(err) => {
            tracing::error!(error = ?err, "Result callback processing failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "processing failed")
        }
    }
}

fn parse_callback(fields: &[(String, String)]) -> Result<CallbackParams, &'static str> {
    let field = |name: &str| {
        fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };

    let out_sum = field("OutSum").ok_or("missing OutSum")?;
    let inv_id: i64 = field("InvId")
        .ok_or("missing InvId")?
        .parse()
        .map_err(|_| "invalid InvId")?;
    let signature = field("SignatureValue").ok_or("missing SignatureValue")?;
    let recurring_id = field("RecurringID").filter(|v| !v.trim().is_empty());
    let shp = fields
        .iter()
        .filter(|(k, _)| k.starts_with("Shp_"))
        .cloned()
        .collect();

    Ok(CallbackParams {
        out_sum,
        inv_id,
        signature,
        recurring_id,
        shp,
    })
}

fn error_body(status: StatusCode, detail: &str) -> Response {
    (status, format!("ERROR: {detail}")).into_response()
}

/// GET /api/robokassa/success
/// Browser landing after a completed redirect payment. The authoritative
/// outcome arrives on the result callback; this page is informational.
async fn success_landing() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "success",
        "message": "Payment accepted. You can return to the bot."
    }))
}

/// GET /api/robokassa/fail
async fn fail_landing() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "fail",
        "message": "Payment was not completed. You can retry from the bot."
    }))
}
