use std::io::IsTerminal;

use tracing_subscriber::{EnvFilter, fmt};

/// Installs the stderr log subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `-v` raises the level from
/// `warn` to `debug` (every executed statement) and `-vv` to `trace`.
pub fn setup_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .compact()
        .without_time()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: a tracing subscriber is already installed");
    }
}
