use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "SYNTAVIZ_LOG";

/// Install the global subscriber. Logs go to stderr so stdout stays
/// machine-readable.
///
/// `-v`/`-vv` force `debug`/`trace`; otherwise `SYNTAVIZ_LOG` applies,
/// falling back to `info`.
pub fn init(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // A second init (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
