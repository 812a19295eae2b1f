//! Subscription status and cancellation.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    adapters::http::app_state::AppState,
    application::app_error::AppResult,
    domain::entities::subscription::SubscriptionStatus,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{telegram_user_id}", get(get_subscription))
        .route("/{telegram_user_id}/cancel", post(cancel_subscription))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionView {
    telegram_user_id: i64,
    status: SubscriptionStatus,
    has_access: bool,
    trial_end_at: Option<DateTime<Utc>>,
    next_charge_at: Option<DateTime<Utc>>,
}

/// GET /api/subscriptions/{telegram_user_id}
/// Users with no subscription row report `none` rather than 404.
async fn get_subscription(
    State(app_state): State<AppState>,
    Path(telegram_user_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let sub = app_state.subscription_use_cases.get(telegram_user_id).await?;

    let view = match sub {
        Some(sub) => SubscriptionView {
            telegram_user_id: sub.telegram_user_id,
            status: sub.status,
            has_access: sub.status.has_access(),
            trial_end_at: sub.trial_end_at,
            next_charge_at: sub.next_charge_at,
        },
        None => SubscriptionView {
            telegram_user_id,
            status: SubscriptionStatus::None,
            has_access: false,
            trial_end_at: None,
            next_charge_at: None,
        },
    };
    Ok(Json(view))
}

/// POST /api/subscriptions/{telegram_user_id}/cancel
async fn cancel_subscription(
    State(app_state): State<AppState>,
    Path(telegram_user_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    app_state
        .subscription_use_cases
        .cancel(telegram_user_id)
        .await?;
    Ok(Json(serde_json::json!({ "status": "expired" })))
}
