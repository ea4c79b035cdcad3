use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use crate::models::InputPrecedence;
use crate::services::gemini::DEFAULT_GEMINI_URL;
use crate::services::openfoodfacts::DEFAULT_OPENFOODFACTS_URL;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_ANALYZER_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 45;

/// Reads a variable, treating blank values as unset.
fn lookup_non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup_non_empty(lookup, key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {} '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub google_api_key: String,
    pub gemini_model: Option<String>,
    pub gemini_base_url: String,
    pub openfoodfacts_url: String,
    pub precedence: InputPrecedence,
    pub max_image_bytes: usize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let google_api_key = lookup_non_empty(&lookup, "GOOGLE_API_KEY")
            .context("GOOGLE_API_KEY must be set in .env file")?;

        Ok(Self {
            host: lookup_non_empty(&lookup, "HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            google_api_key,
            gemini_model: lookup_non_empty(&lookup, "GEMINI_MODEL"),
            gemini_base_url: lookup_non_empty(&lookup, "GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string()),
            openfoodfacts_url: lookup_non_empty(&lookup, "OPENFOODFACTS_URL")
                .unwrap_or_else(|| DEFAULT_OPENFOODFACTS_URL.to_string()),
            precedence: parse_or(&lookup, "INPUT_PRECEDENCE", InputPrecedence::default())?,
            max_image_bytes: parse_or(&lookup, "MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ANALYZER_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secs: u64 = parse_or(&lookup, "ANALYZER_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if secs == 0 {
            anyhow::bail!("ANALYZER_TIMEOUT_SECS must be greater than zero");
        }

        Ok(Self {
            base_url: lookup_non_empty(&lookup, "ANALYZER_URL")
                .unwrap_or_else(|| DEFAULT_ANALYZER_URL.to_string()),
            timeout: Duration::from_secs(secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::from_lookup(vars(&[("GOOGLE_API_KEY", "k")])).unwrap();

        assert_eq!(config.bind_addr(), "127.0.0.1:8000");
        assert_eq!(config.gemini_model, None);
        assert_eq!(config.gemini_base_url, DEFAULT_GEMINI_URL);
        assert_eq!(config.openfoodfacts_url, DEFAULT_OPENFOODFACTS_URL);
        assert_eq!(config.precedence, InputPrecedence::ImageFirst);
        assert_eq!(config.max_image_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_server_requires_api_key() {
        let err = ServerConfig::from_lookup(vars(&[("GOOGLE_API_KEY", "  ")])).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_server_overrides() {
        let config = ServerConfig::from_lookup(vars(&[
            ("GOOGLE_API_KEY", "k"),
            ("HOST", "0.0.0.0"),
            ("PORT", "9000"),
            ("GEMINI_MODEL", "gemini-2.0-flash"),
            ("INPUT_PRECEDENCE", "name-first"),
            ("MAX_IMAGE_BYTES", "1024"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.gemini_model.as_deref(), Some("gemini-2.0-flash"));
        assert_eq!(config.precedence, InputPrecedence::NameFirst);
        assert_eq!(config.max_image_bytes, 1024);
    }

    #[test]
    fn test_invalid_port_is_reported() {
        let err = ServerConfig::from_lookup(vars(&[("GOOGLE_API_KEY", "k"), ("PORT", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("invalid PORT 'http'"));
    }

    #[test]
    fn test_client_config() {
        assert_eq!(ClientConfig::from_lookup(vars(&[])).unwrap(), ClientConfig::default());

        let config = ClientConfig::from_lookup(vars(&[
            ("ANALYZER_URL", "http://analyzer:8000"),
            ("ANALYZER_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://analyzer:8000");
        assert_eq!(config.timeout, Duration::from_secs(5));

        assert!(ClientConfig::from_lookup(vars(&[("ANALYZER_TIMEOUT_SECS", "0")])).is_err());
    }
}
