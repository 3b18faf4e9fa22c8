use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise default non-JSON `Bookwire` logging.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` (the configured
/// `LOG_LEVEL`) applies.
pub fn init_logging(default_directive: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(
                    default_directive
                        .parse()
                        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO.into()),
                )
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .init()
}

/// Initialise default JSON `Bookwire` logging.
pub fn init_json_logging(default_directive: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(
                    default_directive
                        .parse()
                        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO.into()),
                )
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .init()
}
