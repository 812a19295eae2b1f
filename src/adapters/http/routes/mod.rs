pub mod cron;
pub mod payments;
pub mod robokassa;
pub mod subscriptions;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/payments", payments::router())
        .nest("/subscriptions", subscriptions::router())
        .nest("/robokassa", robokassa::router())
        .nest("/cron", cron::router())
}
