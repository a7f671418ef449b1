//! Tracing setup for the command-line front end.

use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// Map `-v` count to a level: 0=warn, 1=info, 2=debug, 3+=trace
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `verbosity` when set.
pub fn init_logging(verbosity: u8) -> Result<(), TryInitError> {
    let level = level_for(verbosity);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("filedrop={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(verbosity >= 2)
                .with_writer(std::io::stderr),
        )
        .try_init()
}
