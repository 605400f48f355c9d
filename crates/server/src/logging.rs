use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tagdeploy_core::Environment;

/// Filter used when `RUST_LOG` is not set.
fn default_directive(env: Environment) -> &'static str {
    match env {
        Environment::Local | Environment::Dev => "debug",
        Environment::Prod => "info",
    }
}

/// Install the global subscriber: text locally, JSON elsewhere.
pub fn init_logging(env: Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(env)));

    let registry = tracing_subscriber::registry().with(filter);
    match env {
        Environment::Local => registry.with(tracing_subscriber::fmt::layer()).init(),
        Environment::Dev | Environment::Prod => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
    }
}
