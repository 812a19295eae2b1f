//! Externally triggered renewal sweep, guarded by a shared bearer secret.

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use secrecy::ExposeSecret;

use crate::{
    adapters::http::app_state::AppState,
    application::app_error::{AppError, AppResult},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/renewals", get(run_renewals))
        .route("/renewals", post(run_renewals))
}

/// GET|POST /api/cron/renewals
/// Requires `Authorization: Bearer {CRON_SECRET}`. Both methods are
/// accepted because hosted cron triggers differ in what they send.
async fn run_renewals(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;
    if token != app_state.config.cron_secret.expose_secret() {
        return Err(AppError::Unauthorized);
    }

    let summary = app_state.renewal_use_cases.run_sweep(Utc::now()).await?;
    Ok(Json(summary))
}
