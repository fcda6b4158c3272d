use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "DBSNAP_LOG";

/// Initialize tracing on stderr with the DBSNAP_LOG filter.
///
/// Defaults to `warn`, or `debug` for our own crate when `verbose` is set.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "warn,dbsnap=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
