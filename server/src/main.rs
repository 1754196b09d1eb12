use std::net::SocketAddr;

use color_eyre::eyre::WrapErr as _;
use herta_puppet_club::{
    routes,
    setup::{setup_sentry, setup_tracing},
    AppState, Config,
};
use tracing::info;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // Initialize Sentry for error tracking
    let _sentry_guard = setup_sentry();

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()?
        .block_on(async { run_application().await })
}

async fn run_application() -> color_eyre::Result<()> {
    setup_tracing("herta_puppet_club")?;

    info!("Herta Puppet Club starting");

    let config = Config::from_env()?;
    let app_state = AppState::from_config(&config).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("Failed to bind {addr}"))?;

    info!("Listening on {}", addr);
    axum::serve(listener, routes(app_state))
        .await
        .wrap_err("Server exited")?;

    Ok(())
}
