//! Test data factories. Each creates a complete, valid object with
//! sensible defaults; use the closure parameter to override fields.

use axum::http::HeaderValue;
use chrono::Utc;
use secrecy::SecretString;

use crate::{
    domain::entities::{
        money::Money,
        subscription::{Subscription, SubscriptionStatus},
    },
    infra::config::{AppConfig, RobokassaConfig},
};

pub fn subscription_factory(
    telegram_user_id: i64,
    status: SubscriptionStatus,
    overrides: impl FnOnce(&mut Subscription),
) -> Subscription {
    let now = Utc::now();
    let mut sub = Subscription {
        telegram_user_id,
        status,
        recurring_id: None,
        trial_end_at: None,
        next_charge_at: None,
        last_invoice_id: None,
        failed_charge_attempts: 0,
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut sub);
    sub
}

/// Config with the fixed credentials the signature golden tests assume
/// ("acme" / "secret" / "secret2").
pub fn test_app_config() -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://localhost/test".to_string(),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
        robokassa: RobokassaConfig {
            merchant_login: "acme".to_string(),
            password1: SecretString::new("secret".to_string().into()),
            password2: SecretString::new("secret2".to_string().into()),
            is_test: false,
            payment_url: "https://auth.robokassa.ru/Merchant/Index.aspx".to_string(),
            recurring_url: "https://auth.robokassa.ru/Merchant/Recurring".to_string(),
        },
        cron_secret: SecretString::new("cron-secret".to_string().into()),
        trial_days: 3,
        trial_amount: Money::from_kopecks(100),
        monthly_amount: Money::from_kopecks(19_900),
        renewal_interval_secs: 600,
        max_missed_charge_attempts: 5,
    }
}
