//! Test app state builder for HTTP-level testing.
//!
//! Wires the full use-case graph over in-memory mocks, keeping handles to
//! the mocks so tests can seed and inspect state behind the endpoints.

use std::sync::Arc;

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        callback::CallbackUseCases, invoice::InvoiceAllocator, payments::PaymentUseCases,
        renewal::RenewalUseCases, subscriptions::SubscriptionUseCases,
    },
    infra::config::AppConfig,
    test_utils::{
        InMemoryPaymentLedgerRepo, InMemorySubscriptionRepo, ScriptedGateway, test_app_config,
    },
};

pub struct TestAppStateBuilder {
    config: AppConfig,
    gateway: ScriptedGateway,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            config: test_app_config(),
            gateway: ScriptedGateway::accepting(),
        }
    }

    pub fn with_gateway(mut self, gateway: ScriptedGateway) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn build(self) -> TestApp {
        let config = Arc::new(self.config);
        let ledger = Arc::new(InMemoryPaymentLedgerRepo::new());
        let subscriptions = Arc::new(InMemorySubscriptionRepo::new());
        let gateway = Arc::new(self.gateway);

        let subscription_use_cases = Arc::new(SubscriptionUseCases::new(
            subscriptions.clone(),
            config.clone(),
        ));
        let payment_use_cases = Arc::new(PaymentUseCases::new(
            ledger.clone(),
            InvoiceAllocator::new(ledger.clone()),
            config.clone(),
        ));
        let callback_use_cases = Arc::new(CallbackUseCases::new(
            ledger.clone(),
            subscription_use_cases.clone(),
            config.clone(),
        ));
        let renewal_use_cases = Arc::new(RenewalUseCases::new(
            subscriptions.clone(),
            subscription_use_cases.clone(),
            ledger.clone(),
            InvoiceAllocator::new(ledger.clone()),
            gateway.clone(),
            config.clone(),
        ));

        let state = AppState {
            config,
            payment_use_cases,
            subscription_use_cases,
            callback_use_cases,
            renewal_use_cases,
        };

        TestApp {
            state,
            ledger,
            subscriptions,
            gateway,
        }
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub ledger: Arc<InMemoryPaymentLedgerRepo>,
    pub subscriptions: Arc<InMemorySubscriptionRepo>,
    pub gateway: Arc<ScriptedGateway>,
}
