use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over the verbosity
/// flags when set.
pub fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "jb=warn",
        1 => "jb=info",
        _ => "jb=debug",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
