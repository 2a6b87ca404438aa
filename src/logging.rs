use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing to stderr. `RUST_LOG` overrides the default filter;
/// `verbose` raises the default to debug for everything.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info,ai_tutor=debug" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();

    tracing::debug!("Tracing initialized");
}
