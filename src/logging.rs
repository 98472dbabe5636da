//! `tracing` subscriber setup: stderr plus a plain-text log file.

use crate::config::{cache_dir, Config};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Events go to stderr and, when
/// the cache directory can be created, to `mailsift.log` inside it. Fails if
/// a global subscriber is already set.
pub fn init_logging(level: &str, config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailsift.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .try_init()?;
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .try_init()?;
    }

    tracing::debug!(dir = %log_dir.display(), "Logging initialized");
    Ok(())
}
