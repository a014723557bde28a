//! Logging initialization for the devbind binary
//!
//! Events go to stderr so `list` and `filter-diff` output stays clean on
//! stdout. `RUST_LOG` overrides the configured level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = build_env_filter(config);
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if config.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))?;

    tracing::debug!(level = %config.level, json = config.json, "Logging initialized");
    Ok(())
}

/// Plain logging for early failures, before configuration is available.
pub fn init_simple_logging() {
    let installed = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "devbind=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
    if installed.is_err() {
        tracing::debug!("Keeping the subscriber installed earlier");
    }
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "devbind={level},devbind_codegen={level},devbind_model={level}",
            level = config.level
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_logging_tolerates_an_installed_subscriber() {
        init_simple_logging();
        init_simple_logging();
        tracing::info!("still logging");
    }

    #[test]
    fn default_filter_covers_every_crate() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let filter = build_env_filter(&LoggingConfig {
            level: "debug".to_string(),
            json: false,
        });
        let rendered = filter.to_string();
        for target in ["devbind=debug", "devbind_codegen=debug", "devbind_model=debug"] {
            assert!(rendered.contains(target), "{}", rendered);
        }
    }
}
