use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{anyhow, Result};
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::{
    fmt::{self, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_FILE_NAME: &str = "eventquill.log";
const PREVIEW_CHARS: usize = 200;

/**
 * \brief Installs the global tracing subscriber.
 *
 * Filter comes from `RUST_LOG` (default `info`). When `EVENTQUILL_LOG_DIR` is
 * set, events are also appended to `<dir>/eventquill.log`.
 */
pub fn init() -> Result<()> {
    let log_dir = std::env::var("EVENTQUILL_LOG_DIR").ok().map(PathBuf::from);
    init_with(log_dir.as_deref())
}

/**
 * \brief Installs the global tracing subscriber with an explicit log directory.
 */
pub fn init_with(log_dir: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let timer = UtcTime::new(Rfc3339);

    let stderr_layer = fmt::layer()
        .with_timer(timer.clone())
        .with_writer(std::io::stderr);

    let file_layer = match log_dir {
        Some(dir) => {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(LOG_FILE_NAME))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_timer(timer)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("install tracing subscriber failed: {}", e))
}

/**
 * \brief Shortens text for log fields, keeping the first 200 characters.
 */
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
