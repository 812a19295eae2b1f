use dotenvy::dotenv;
use tracing::info;

use std::net::SocketAddr;
use stepone_billing::infra::{
    app::create_app, renewal_worker::run_renewal_loop, setup::init_app_state,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let app_state = init_app_state().await?;

    let bind_addr = app_state.config.bind_addr;

    let app = create_app(app_state.clone());

    // Spawn the renewal sweep background task (after tracing is initialized)
    let renewal_use_cases = app_state.renewal_use_cases.clone();
    let interval_secs = app_state.config.renewal_interval_secs;
    tokio::spawn(async move {
        run_renewal_loop(renewal_use_cases, interval_secs).await;
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
