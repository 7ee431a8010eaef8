use tracing_subscriber::{EnvFilter, fmt};

/// `RUST_LOG` wins over `level` when set. Output goes to stderr so JSON on stdout stays clean.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
