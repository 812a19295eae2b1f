//! In-process periodic renewal sweep, for deployments without an external
//! cron trigger. Runs the same use case as `/api/cron/renewals`; invoking
//! both is safe because a renewed subscription drops out of the due set.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info};

use crate::application::use_cases::renewal::RenewalUseCases;

pub async fn run_renewal_loop(renewal_uc: Arc<RenewalUseCases>, interval_secs: u64) {
    let mut ticker = interval(Duration::from_secs(interval_secs));

    info!(interval_secs, "Renewal worker started");

    loop {
        ticker.tick().await;

        match renewal_uc.run_sweep(Utc::now()).await {
            Ok(summary) if summary.processed > 0 => {
                info!(
                    processed = summary.processed,
                    success = summary.success,
                    failed = summary.failed,
                    "Renewal sweep completed"
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "Renewal sweep failed");
            }
        }
    }
}
