mod api;
mod config;
mod error;
mod main_lib;

use tracing::info;

use crate::config::Config;

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    main_lib::init_tracing();

    let config = Config::from_env()?;
    let state = main_lib::build_state(&config)?;
    if config.scheduler_autostart {
        state.scheduler.start().await;
    }

    let app = api::app_router(state.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("stepsync listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.scheduler.stop().await;
    Ok(())
}
