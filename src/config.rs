//! Environment-driven configuration for the dashboard and its backend client.

use std::env;
use std::fs;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::assembler::DEFAULT_PAGE_SIZE;
use crate::error::ConfigError;
use crate::feed_state::TokenListMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub bind_addr: String,
    pub token_list_mode: TokenListMode,
    pub tokens_per_page: usize,
    pub http_timeout: Duration,
    pub analysis_settle_delay: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            api_key: None,
            bind_addr: "127.0.0.1:8080".to_string(),
            token_list_mode: TokenListMode::Full,
            tokens_per_page: DEFAULT_PAGE_SIZE,
            http_timeout: Duration::from_millis(15_000),
            analysis_settle_delay: Duration::from_millis(2_000),
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = env_non_empty("ALPHA_API_BASE_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        config.api_key = match env_non_empty("ALPHA_API_KEY") {
            Some(key) => Some(key),
            None => api_key_from_page(env_non_empty("ALPHA_API_KEY_PAGE"))?,
        };
        if let Some(addr) = env_non_empty("ALPHA_DASHBOARD_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(mode) = env_non_empty("ALPHA_TOKEN_LIST_MODE") {
            config.token_list_mode = mode.parse().map_err(|_| ConfigError::InvalidValue {
                key: "ALPHA_TOKEN_LIST_MODE",
                value: mode.clone(),
            })?;
        }
        if let Some(per_page) = env_number("ALPHA_TOKENS_PER_PAGE")? {
            config.tokens_per_page = usize::try_from(per_page)
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "ALPHA_TOKENS_PER_PAGE",
                    value: per_page.to_string(),
                })?;
        }
        if let Some(ms) = env_number("ALPHA_HTTP_TIMEOUT_MS")? {
            config.http_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_number("ALPHA_ANALYSIS_SETTLE_MS")? {
            config.analysis_settle_delay = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

/// An API key is usable only when present and non-blank.
pub fn require_api_key(raw: Option<&str>) -> Result<&str, ConfigError> {
    raw.map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(ConfigError::MissingApiKey)
}

/// Reads `<meta name="api-key" content="...">` from a served page. Empty
/// content counts as absent.
pub fn api_key_from_meta(html: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r#"<meta\s+name\s*=\s*["']api-key["']\s+content\s*=\s*["']([^"']*)["']"#)
            .expect("api-key meta pattern is valid")
    });

    pattern
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|key| key.as_str().trim().to_string())
        .filter(|key| !key.is_empty())
}

/// `ALPHA_API_KEY_PAGE` names an HTML page carrying the key in a meta tag.
fn api_key_from_page(path: Option<String>) -> Result<Option<String>, ConfigError> {
    let Some(path) = path else {
        return Ok(None);
    };
    let html = fs::read_to_string(&path).map_err(|_| ConfigError::InvalidValue {
        key: "ALPHA_API_KEY_PAGE",
        value: path.clone(),
    })?;
    Ok(api_key_from_meta(&html))
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn env_number(key: &'static str) -> Result<Option<u64>, ConfigError> {
    match env_non_empty(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(None),
    }
}
