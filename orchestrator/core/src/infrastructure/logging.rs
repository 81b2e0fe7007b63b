// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tracing subscriber setup for hosts embedding the router

use anyhow::{anyhow, Context, Result};
use tracing::Subscriber;

use crate::domain::router_config::LoggingConfig;

/// Subscriber shared by every output format
pub type BoxedSubscriber = Box<dyn Subscriber + Send + Sync + 'static>;

/// Build a subscriber without installing it
///
/// `RUST_LOG` takes precedence over `level`. `format` is `"json"` or
/// `"compact"`; anything else falls back to compact.
pub fn build_subscriber(level: &str, format: &str) -> Result<BoxedSubscriber> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    Ok(match format {
        "json" => Box::new(builder.json().finish()),
        _ => Box::new(builder.compact().finish()),
    })
}

/// Install the global subscriber; fails if one is already installed
pub fn init_logging(level: &str, format: &str) -> Result<()> {
    let subscriber = build_subscriber(level, format)?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

pub fn init_from_config(config: Option<&LoggingConfig>) -> Result<()> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);
    init_logging(&config.level, &config.format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribers_build_for_each_format() {
        for format in ["compact", "json", "pretty"] {
            let subscriber = build_subscriber("debug", format).unwrap();
            tracing::subscriber::with_default(subscriber, || {
                tracing::debug!(format, "scoped subscriber active");
            });
        }
        assert!(!tracing::dispatcher::has_been_set());
    }
}
