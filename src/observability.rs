//! Logging setup and the dashboard server's lifecycle events.
//!
//! Settings come from `ALPHA_LOG_LEVEL`, `ALPHA_LOG_FORMAT` and
//! `ALPHA_LOG_TARGET`. Values that cannot be parsed keep the default and are
//! reported once logging is up, since nothing can be logged before that.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::DashboardConfig;
use crate::dashboard::DASHBOARD_ROUTES;

const LEVEL_KEY: &str = "ALPHA_LOG_LEVEL";
const FORMAT_KEY: &str = "ALPHA_LOG_FORMAT";
const TARGET_KEY: &str = "ALPHA_LOG_TARGET";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
    /// Settings that were present but unusable, as `(key, raw value)`.
    pub ignored: Vec<(&'static str, String)>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
            ignored: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    logging_config_from_lookup(|key| env::var(key).ok())
}

pub fn logging_config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LoggingConfig {
    let mut config = LoggingConfig::default();
    let setting = |key: &str| {
        lookup(key)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
    };

    if let Some(level) = setting(LEVEL_KEY) {
        if EnvFilter::try_new(&level).is_ok() {
            config.level = level;
        } else {
            config.ignored.push((LEVEL_KEY, level));
        }
    }

    if let Some(format) = setting(FORMAT_KEY) {
        match format.parse() {
            Ok(parsed) => config.format = parsed,
            Err(()) => config.ignored.push((FORMAT_KEY, format)),
        }
    }

    if let Some(target) = setting(TARGET_KEY) {
        match parse_bool(&target) {
            Some(parsed) => config.include_target = parsed,
            None => config.ignored.push((TARGET_KEY, target)),
        }
    }

    config
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_ansi(!matches!(config.format, LogFormat::Json));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
        LogFormat::Compact => {
            tracing::subscriber::set_global_default(builder.compact().finish())?
        }
    }

    Ok(())
}

/// First event after logging is up: how the feed will behave, plus any
/// logging setting that fell back to its default.
pub fn log_app_start(logging: &LoggingConfig, dashboard: &DashboardConfig) {
    info!(
        component = "dashboard_server",
        event = "app.start",
        log_level = %logging.level,
        log_format = ?logging.format,
        token_list_mode = %dashboard.token_list_mode,
        tokens_per_page = dashboard.tokens_per_page,
        http_timeout_ms = dashboard.http_timeout.as_millis() as u64,
        analysis_settle_ms = dashboard.analysis_settle_delay.as_millis() as u64
    );
    for (key, value) in &logging.ignored {
        warn!(
            component = "dashboard_server",
            event = "logging.setting_ignored",
            key,
            value = %value
        );
    }
}

/// The key itself is never logged. Without one, analysis and report
/// submission are rejected, so that case is a warning.
pub fn log_backend_selected(config: &DashboardConfig) {
    let api_key_present = config.api_key.is_some();
    if api_key_present {
        info!(
            component = "dashboard_server",
            event = "backend.selected",
            api_base_url = %config.api_base_url,
            api_key_present
        );
    } else {
        warn!(
            component = "dashboard_server",
            event = "backend.selected",
            api_base_url = %config.api_base_url,
            api_key_present,
            note = "analysis and report submission will be rejected"
        );
    }
}

pub fn log_app_bind(bound_addr: SocketAddr) {
    info!(
        component = "dashboard_server",
        event = "app.bind",
        bind_addr = %bound_addr,
        routes = %DASHBOARD_ROUTES.join(",")
    );
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
