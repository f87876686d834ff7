//! The `tack` binary: loads a declarative script and runs its triggers.
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "tack", about = "Event-driven trigger supervisor")]
struct Cli {
    /// Path to the TOML script to load
    file: PathBuf,
    /// Default log level, used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

fn main() {
    let cli = Cli::parse();
    tack::logging::init(cli.log_level);

    let script = match tack::config::load(&cli.file) {
        Ok(script) => script,
        Err(error) => tack::logging::fatal(&format!("failed to load {}: {error}", cli.file.display())),
    };

    let context = match tack::config::build_context(&script) {
        Ok(context) => context,
        Err(error) => tack::logging::fatal(&format!("failed to build triggers: {error}")),
    };

    if let Err(error) = context.install_signal_handler() {
        tack::logging::fatal(&format!("failed to install signal handler: {error}"));
    }

    context.run();
}
