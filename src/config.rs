use crate::error::ConfigError;
use crate::session::DEFAULT_COST_PER_TRADE;
use std::time::Duration;

const DEFAULT_PAYMENTS_HOST: &str = "https://ahr-aoc-backend.onrender.com";
const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Runtime settings, injected through the environment
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Diagnostic upload endpoint
    pub api_url: String,
    pub api_key: String,
    /// Endpoint returning the PDF report
    pub api_url_pdf: String,
    /// Base for `/auth/*` and `/api/my-reports`
    pub api_base: String,
    pub payments_host: String,
    pub bind_addr: String,
    pub timeout: Duration,
    pub default_cost_per_trade: f64,
}

impl Config {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any name lookup; `from_env` uses the environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let api_url = required("API_URL")?;
        let api_key = required("API_KEY")?;
        let api_url_pdf = required("API_URL_PDF")?;
        let api_base = get("API_BASE_URL")
            .map(|b| b.trim_end_matches('/').to_string())
            .unwrap_or_else(|| derive_api_base(&api_url));

        let timeout_secs = match get("API_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    name: "API_TIMEOUT_SECS",
                    value: raw,
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let default_cost_per_trade = match get("DEFAULT_COST_PER_TRADE") {
            Some(raw) => parse_cost_per_trade(&raw, DEFAULT_COST_PER_TRADE).map_err(|_| {
                ConfigError::Invalid {
                    name: "DEFAULT_COST_PER_TRADE",
                    value: raw,
                }
            })?,
            None => DEFAULT_COST_PER_TRADE,
        };

        Ok(Self {
            api_url,
            api_key,
            api_url_pdf,
            api_base,
            payments_host: get("PAYMENTS_HOST").unwrap_or_else(|| DEFAULT_PAYMENTS_HOST.to_string()),
            bind_addr: get("PORTAL_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            default_cost_per_trade,
        })
    }
}

/// Auth and reports live next to the upload endpoint: strip a trailing `/upload`
pub fn derive_api_base(api_url: &str) -> String {
    let trimmed = api_url.trim_end_matches('/');
    trimmed
        .strip_suffix("/upload")
        .unwrap_or(trimmed)
        .to_string()
}

/// Parse the commission + spread input; blank means the default
pub fn parse_cost_per_trade(raw: &str, default: f64) -> Result<f64, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }

    match raw.replace(',', ".").parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(ConfigError::Invalid {
            name: "cost_per_trade",
            value: raw.to_string(),
        }),
    }
}
