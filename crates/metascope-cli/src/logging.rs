//! Diagnostic logging on stderr, powered by tracing-subscriber.

use tracing_subscriber::EnvFilter;

/// Build the filter from `RUST_LOG`, or from the verbosity flags when it is unset.
///
/// Noisy driver crates stay at `warn` unless `RUST_LOG` says otherwise.
fn build_env_filter(verbose: u8, quiet: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut directives = vec![default_level(verbose, quiet).to_string()];
    for target in ["sqlx", "sqlx_core", "hyper", "rustls"] {
        directives.push(format!("{target}=warn"));
    }
    EnvFilter::new(directives.join(","))
}

fn default_level(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    }
}

/// Initialize logging for the binary.
///
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init(verbose: u8, quiet: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(verbose, quiet))
        .with_writer(std::io::stderr)
        .with_target(verbose > 1)
        .try_init();
}
