use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber: human-readable events on stderr.
///
/// `RUST_LOG` wins when set; otherwise `warn`, or `debug` for this crate when verbose.
pub fn init(verbose: bool) {
    let fallback = if verbose { "warn,granacred=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init();
}
