use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::HeaderValue;
use secrecy::SecretString;

use crate::domain::entities::money::Money;

fn get_env<T: FromStr>(name: &str) -> T {
    let raw = std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set"));
    raw.parse()
        .unwrap_or_else(|_| panic!("{name} has an invalid value"))
}

fn get_env_default<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} has an invalid value")),
        Err(_) => default,
    }
}

/// Gateway credentials and tariff knobs. Password #1 signs outbound
/// redirect payments, password #2 signs recurring charges and verifies
/// inbound callbacks.
pub struct RobokassaConfig {
    pub merchant_login: String,
    pub password1: SecretString,
    pub password2: SecretString,
    /// Adds `IsTest=1` to redirect forms. Never part of any signature.
    pub is_test: bool,
    pub payment_url: String,
    pub recurring_url: String,
}

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub cors_origin: HeaderValue,
    pub robokassa: RobokassaConfig,
    /// Shared secret for the cron renewal endpoint (`Authorization: Bearer`).
    pub cron_secret: SecretString,
    pub trial_days: i64,
    /// Parent card-binding charge (1.00 RUB by default).
    pub trial_amount: Money,
    /// Monthly subscription charge (199.00 RUB by default).
    pub monthly_amount: Money,
    /// How often the in-process renewal sweep runs.
    pub renewal_interval_secs: u64,
    /// Consecutive transport failures before a subscription is forced to
    /// expired.
    pub max_missed_charge_attempts: i32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url: String = get_env("DATABASE_URL");
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");

        let merchant_login: String = get_env("ROBOKASSA_MERCHANT_LOGIN");
        let password1 = SecretString::new(get_env::<String>("ROBOKASSA_PASSWORD1").into());
        let password2 = SecretString::new(get_env::<String>("ROBOKASSA_PASSWORD2").into());
        let is_test: bool = get_env_default("ROBOKASSA_IS_TEST", false);
        let payment_url: String = get_env_default(
            "ROBOKASSA_PAYMENT_URL",
            "https://auth.robokassa.ru/Merchant/Index.aspx".to_string(),
        );
        let recurring_url: String = get_env_default(
            "ROBOKASSA_RECURRING_URL",
            "https://auth.robokassa.ru/Merchant/Recurring".to_string(),
        );

        let cron_secret = SecretString::new(get_env::<String>("CRON_SECRET").into());
        let trial_days: i64 = get_env_default("TRIAL_DAYS", 3);
        let trial_amount = Money::from_kopecks(get_env_default("TRIAL_AMOUNT_KOPECKS", 100));
        let monthly_amount = Money::from_kopecks(get_env_default("MONTHLY_AMOUNT_KOPECKS", 19_900));
        let renewal_interval_secs: u64 = get_env_default("RENEWAL_INTERVAL_SECS", 600);
        let max_missed_charge_attempts: i32 = get_env_default("MAX_MISSED_CHARGE_ATTEMPTS", 5);

        Self {
            bind_addr,
            database_url,
            cors_origin,
            robokassa: RobokassaConfig {
                merchant_login,
                password1,
                password2,
                is_test,
                payment_url,
                recurring_url,
            },
            cron_secret,
            trial_days,
            trial_amount,
            monthly_amount,
            renewal_interval_secs,
            max_missed_charge_attempts,
        }
    }
}
