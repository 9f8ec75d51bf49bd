//! Logging and tracing initialization.
//!
//! Log lines go to stdout by default; setting `LoggingConfig.file`
//! redirects them to that file instead, which the CLI uses when its
//! output stream is the artifact itself.

use std::sync::Mutex;

use crate::config::LoggingConfig;

/// Initialize the tracing subscriber with the given configuration.
///
/// `RUST_LOG` overrides the configured level when set. Safe to call more
/// than once; only the first call installs a subscriber.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if let Some(path) = &config.file {
        match std::fs::File::create(path) {
            Ok(file) => {
                let builder = fmt::Subscriber::builder()
                    .with_env_filter(env_filter)
                    .with_writer(Mutex::new(file))
                    .with_ansi(false);
                if config.json {
                    tracing::subscriber::set_global_default(builder.json().finish()).ok();
                } else {
                    tracing::subscriber::set_global_default(builder.finish()).ok();
                }
                return;
            }
            Err(e) => {
                eprintln!("failed to open log file {}: {e}", path.display());
            }
        }
    }

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);
    if config.json {
        tracing::subscriber::set_global_default(builder.json().finish()).ok();
    } else {
        tracing::subscriber::set_global_default(builder.finish()).ok();
    }
}

/// Initialize logging for the CLI: the configured defaults, with the
/// level forced to `debug` when `--verbose` is set.
pub fn init_cli_logging(verbose: bool) {
    let mut config = LoggingConfig::default();
    if verbose {
        config.level = "debug".to_string();
    }
    init_logging(&config);
}
