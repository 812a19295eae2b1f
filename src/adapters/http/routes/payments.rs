//! Payment initiation endpoints.

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::post,
};
use serde::Deserialize;

use crate::{
    adapters::http::app_state::AppState,
    application::app_error::AppResult,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trial", post(create_trial))
        .route("/monthly", post(create_monthly))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentRequest {
    telegram_user_id: i64,
    /// Include a masked signature-base breakdown in the response.
    #[serde(default)]
    debug: bool,
}

/// POST /api/payments/trial
/// Card-binding trial payment (1 RUB parent with Recurring=true).
async fn create_trial(
    State(app_state): State<AppState>,
    Json(req): Json<CreatePaymentRequest>,
) -> AppResult<impl IntoResponse> {
    let form = app_state
        .payment_use_cases
        .create_trial_payment(req.telegram_user_id, req.debug)
        .await?;
    Ok(Json(form))
}

/// POST /api/payments/monthly
/// One-time monthly payment, no card binding.
async fn create_monthly(
    State(app_state): State<AppState>,
    Json(req): Json<CreatePaymentRequest>,
) -> AppResult<impl IntoResponse> {
    let form = app_state
        .payment_use_cases
        .create_monthly_payment(req.telegram_user_id, req.debug)
        .await?;
    Ok(Json(form))
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode};
    use axum_test::TestServer;

    use crate::{
        adapters::http::{self, app_state::AppState},
        test_utils::TestAppStateBuilder,
    };

    fn test_server(state: AppState) -> TestServer {
        let app = Router::new()
            .nest("/api", http::routes::router())
            .with_state(state);
        TestServer::new(app).unwrap()
    }

    #[tokio::test]
    async fn trial_endpoint_returns_a_signed_form() {
        let app = TestAppStateBuilder::new().build();
        let server = test_server(app.state.clone());

        let response = server
            .post("/api/payments/trial")
            .json(&serde_json::json!({ "telegramUserId": 777 }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body: serde_json::Value = response.json();
        assert!(body["paymentUrl"].as_str().unwrap().starts_with("https://"));
        let fields = body["fields"].as_array().unwrap();
        assert!(fields.iter().any(|f| f["name"] == "Recurring"));
        assert!(body.get("debug").is_none());
        assert_eq!(app.ledger.row_count(), 1);
    }

    #[tokio::test]
    async fn second_pending_trial_conflicts() {
        let app = TestAppStateBuilder::new().build();
        let server = test_server(app.state.clone());
        let body = serde_json::json!({ "telegramUserId": 777 });

        let first = server.post("/api/payments/trial").json(&body).await;
        assert_eq!(first.status_code(), StatusCode::OK);

        let second = server.post("/api/payments/trial").json(&body).await;
        assert_eq!(second.status_code(), StatusCode::CONFLICT);
        let err: serde_json::Value = second.json();
        assert_eq!(err["code"], "PARENT_PAYMENT_PENDING");
    }

    #[tokio::test]
    async fn invalid_user_id_is_a_bad_request() {
        let app = TestAppStateBuilder::new().build();
        let server = test_server(app.state.clone());

        let response = server
            .post("/api/payments/monthly")
            .json(&serde_json::json!({ "telegramUserId": -1 }))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let err: serde_json::Value = response.json();
        assert_eq!(err["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn debug_flag_returns_masked_base() {
        let app = TestAppStateBuilder::new().build();
        let server = test_server(app.state.clone());

        let response = server
            .post("/api/payments/monthly")
            .json(&serde_json::json!({ "telegramUserId": 777, "debug": true }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body: serde_json::Value = response.json();
        let base = body["debug"]["signatureBaseMasked"].as_str().unwrap();
        assert!(base.contains("[PASSWORD_HIDDEN]"));
        assert!(!base.contains("secret"));
    }
}
