use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        callback::CallbackUseCases,
        invoice::InvoiceAllocator,
        payments::{PaymentLedgerRepo, PaymentUseCases},
        renewal::RenewalUseCases,
        subscriptions::{SubscriptionRepo, SubscriptionUseCases},
    },
    infra::{config::AppConfig, postgres_persistence, robokassa::client::RobokassaClient},
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = Arc::new(AppConfig::from_env());

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);
    let ledger_arc = postgres_arc.clone() as Arc<dyn PaymentLedgerRepo>;
    let subscription_repo_arc = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;

    let gateway = Arc::new(RobokassaClient::new(&config.robokassa)?);

    let subscription_use_cases = Arc::new(SubscriptionUseCases::new(
        subscription_repo_arc.clone(),
        config.clone(),
    ));
    let payment_use_cases = Arc::new(PaymentUseCases::new(
        ledger_arc.clone(),
        InvoiceAllocator::new(ledger_arc.clone()),
        config.clone(),
    ));
    let callback_use_cases = Arc::new(CallbackUseCases::new(
        ledger_arc.clone(),
        subscription_use_cases.clone(),
        config.clone(),
    ));
    let renewal_use_cases = Arc::new(RenewalUseCases::new(
        subscription_repo_arc,
        subscription_use_cases.clone(),
        ledger_arc.clone(),
        InvoiceAllocator::new(ledger_arc),
        gateway,
        config.clone(),
    ));

    Ok(AppState {
        config,
        payment_use_cases,
        subscription_use_cases,
        callback_use_cases,
        renewal_use_cases,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stepone_billing=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
