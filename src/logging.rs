//! Logging setup and the fatal-configuration-error exit path.
use colored::Colorize as _;
use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber at the given default level.
///
/// The level is used only when `RUST_LOG` is not set; `RUST_LOG` always takes
/// precedence, matching `EnvFilter`'s usual behavior.
pub fn init(default_level: tracing::Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Logs `msg` at the critical severity and immediately terminates the
/// process with a non-zero exit code.
///
/// Used for configuration errors: missing required options, unknown trigger
/// kinds, an unset `TOKEN` when a `globus` trigger requests it from the
/// environment. None of these are recoverable, so there is no `Result` to
/// return to a caller further up.
pub fn fatal(msg: &str) -> ! {
    tracing::error!("{msg}");
    eprintln!("{}", msg.red().bold());
    std::process::exit(1);
}
