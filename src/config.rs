//! Runtime configuration from the environment (and `.env`)

use crate::error::ReconcileError;
use crate::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::matcher::coordinator::DEFAULT_MAX_FUZZY_ITEMS;
use crate::audit::DEFAULT_ACTOR;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub api_port: u16,
    pub acting_user: String,
    pub fuzzy_max_items: usize,
    pub erp_latency: Duration,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => parse_number::<u16>("PORT", &raw)?,
            None => 8080,
        };
        let fuzzy_max_items = match get("FUZZY_MAX_ITEMS") {
            Some(raw) => parse_number::<usize>("FUZZY_MAX_ITEMS", &raw)?,
            None => DEFAULT_MAX_FUZZY_ITEMS,
        };
        let latency_ms = match get("ERP_SIMULATED_LATENCY_MS") {
            Some(raw) => parse_number::<u64>("ERP_SIMULATED_LATENCY_MS", &raw)?,
            None => 1000,
        };

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_port,
            acting_user: get("RECONCILE_ACTING_USER").unwrap_or_else(|| DEFAULT_ACTOR.to_string()),
            fuzzy_max_items,
            erp_latency: Duration::from_millis(latency_ms),
        })
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| ReconcileError::ConfigError(format!("{} must be a number, got '{}'", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.gemini_model, DEFAULT_MODEL);
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.acting_user, "Current User");
        assert_eq!(config.fuzzy_max_items, 200);
        assert_eq!(config.erp_latency, Duration::from_millis(1000));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("API_PORT", "9090"),
            ("FUZZY_MAX_ITEMS", "50"),
            ("ERP_SIMULATED_LATENCY_MS", "0"),
        ])
        .unwrap();

        assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(config.api_port, 9090);
        assert_eq!(config.fuzzy_max_items, 50);
        assert!(config.erp_latency.is_zero());
    }

    #[test]
    fn test_blank_key_is_unset() {
        let config = config_from(&[("GEMINI_API_KEY", "  ")]).unwrap();
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_invalid_number() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ReconcileError::ConfigError(_)));
    }
}
