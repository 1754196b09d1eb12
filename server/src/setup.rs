use color_eyre::eyre::WrapErr as _;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;

/// Install the global subscriber: `RUST_LOG` filtering, defaulting to `info`, with an
/// indented tree of spans so one callback reads as one block in the logs.
pub fn setup_tracing(crate_name: &str) -> color_eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,{crate_name}=info")));

    let tree = HierarchicalLayer::new(2)
        .with_targets(true)
        .with_bracketed_fields(true);

    Registry::default()
        .with(filter)
        .with(tree)
        .try_init()
        .wrap_err("Failed to install tracing subscriber")?;

    Ok(())
}

/// Sentry is only enabled when `SENTRY_DSN` is set. Keep the guard alive for the
/// whole process or buffered events are dropped.
pub fn setup_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|dsn| !dsn.is_empty())?;

    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            traces_sample_rate: 1.0,
            ..Default::default()
        },
    )))
}
