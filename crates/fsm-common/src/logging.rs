//! ---
//! fsm_section: "01-core-functionality"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Shared configuration and tracing bootstrap."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "FSM_CONSOLE_LOG";

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static STDERR_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Output format of the console (stderr) log layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Resolve the filter directive: `FSM_CONSOLE_LOG`, then `RUST_LOG`, then the
/// configured default level.
fn resolve_filter(default_level: &str) -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("invalid {LOG_ENV} directive ({err}); falling back to {default_level}");
            EnvFilter::new(default_level)
        }),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
    }
}

/// Initialize the tracing subscriber for a console process.
///
/// Console output goes to stderr so that command results printed on stdout stay
/// machine readable. When [`LoggingConfig::directory`] is set, a daily rolling
/// JSON file named `<prefix>-<service>.log` is written there as well.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = STDERR_GUARD.set(stderr_guard);

    let console_layer = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(stderr_writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(stderr_writer)
            .boxed(),
    };

    let file_layer = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let prefix = config.file_prefix.as_deref().unwrap_or("fsm-console");
            let appender = daily(directory, format!("{prefix}-{service_name}.log"));
            let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(file_guard);
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_timer(fmt::time::UtcTime::rfc_3339())
                    .json()
                    .with_writer(file_writer)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(resolve_filter(&config.level))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok();

    info!(
        service = %service_name,
        log_dir = ?config.directory,
        format = ?config.format,
        "tracing initialised"
    );
    Ok(())
}
