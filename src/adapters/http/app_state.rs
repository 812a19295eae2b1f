use std::sync::Arc;

use crate::{
    application::use_cases::{
        callback::CallbackUseCases, payments::PaymentUseCases, renewal::RenewalUseCases,
        subscriptions::SubscriptionUseCases,
    },
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub payment_use_cases: Arc<PaymentUseCases>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub callback_use_cases: Arc<CallbackUseCases>,
    pub renewal_use_cases: Arc<RenewalUseCases>,
}
