//! Optional `tracing` subscriber setup.
//!
//! The library only emits events. Applications that have no subscriber of
//! their own can call [`init_logging`] once at startup.

use std::path::PathBuf;
use std::sync::Once;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::errors::{PathwayError, PathwayResult};

const LOG_FILE_PREFIX: &str = "pathway.log";

static UNOBSERVED_NOTICE: Once = Once::new();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub filter: String,
    /// Write a daily-rolling log file here instead of to stderr.
    pub log_dir: Option<PathBuf>,
    pub ansi: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            log_dir: None,
            ansi: true,
        }
    }
}

impl LoggingOptions {
    fn env_filter(&self) -> PathwayResult<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => filter_from(&self.filter),
        }
    }
}

fn filter_from(directive: &str) -> PathwayResult<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| PathwayError::Config(format!("invalid log filter '{}': {}", directive, e)))
}

/// Print a one-time stderr notice when no global subscriber is installed.
///
/// Events are still emitted; without a subscriber they are discarded.
pub(crate) fn warn_if_unobserved() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    UNOBSERVED_NOTICE.call_once(|| {
        eprintln!(
            "pathway: no tracing subscriber installed, log events are discarded \
             (call pathway::init_logging or install a subscriber)"
        );
    });
}

/// Install the global subscriber.
///
/// With a file sink the returned guard must be kept alive for buffered
/// lines to be flushed. Fails if a global subscriber is already installed.
pub fn init_logging(options: &LoggingOptions) -> PathwayResult<Option<WorkerGuard>> {
    let filter = options.env_filter()?;

    match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                PathwayError::Config(format!(
                    "failed to create log directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .try_init()
                .map_err(|e| PathwayError::Config(format!("failed to install logger: {}", e)))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(options.ansi),
                )
                .try_init()
                .map_err(|e| PathwayError::Config(format!("failed to install logger: {}", e)))?;
            Ok(None)
        }
    }
}
