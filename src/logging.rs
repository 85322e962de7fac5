//! Logging initialization

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// Install a global tracing subscriber. `RUST_LOG` overrides `config.level`.
///
/// Logs go to stderr so they never mix with data written to stdout.
/// Calling this more than once is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}

pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_does_not_panic() {
        init_default_logging();
        init_logging(&LoggingConfig {
            level: "debug".to_string(),
            json: true,
        });
    }
}
