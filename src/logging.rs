//! File-backed `tracing` subscriber.
//!
//! The terminal belongs to the UI while browsing, so nothing is ever written
//! to stdout or stderr from here. Events go to the configured log file, or
//! `<cache_dir>/post-roulette/post-roulette.log` when none is set.
//!
//! The filter comes from `POST_ROULETTE_LOG` when present (any `EnvFilter`
//! directive string), otherwise from `log.level` in the config.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

pub const LOG_ENV: &str = "POST_ROULETTE_LOG";

/// Installs the global subscriber and returns the file it writes to.
///
/// Returns `Ok(None)` when no log file is configured and the platform has no
/// cache directory.
pub fn init(config: &LogConfig) -> Result<Option<PathBuf>> {
    let Some(path) = log_path(config) else {
        return Ok(None);
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("logging: create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("logging: open {}", path.display()))?;

    let layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false);

    tracing_subscriber::registry()
        .with(build_filter(std::env::var(LOG_ENV).ok().as_deref(), &config.level))
        .with(layer)
        .try_init()
        .map_err(|err| anyhow!("logging: install subscriber: {err}"))?;
    Ok(Some(path))
}

fn log_path(config: &LogConfig) -> Option<PathBuf> {
    config.file.clone().or_else(default_log_path)
}

fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("post-roulette").join("post-roulette.log"))
}

fn build_filter(env_directives: Option<&str>, level: &str) -> EnvFilter {
    env_directives
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
