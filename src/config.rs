use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::errors::BridgeError;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub custom_models: Vec<String>,
    pub log_level: String,
    pub request_timeout: u64,
    pub stream_request_timeout: Option<u64>,
    pub legacy_retry_matching: bool,
    pub custom_headers: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            custom_models: Vec::new(),
            log_level: "INFO".to_string(),
            request_timeout: 90,
            stream_request_timeout: None,
            legacy_retry_matching: false,
            custom_headers: HashMap::new(),
        }
    }
}

/// Credentials checked once per call, before any network traffic.
#[derive(Clone, Copy, Debug)]
pub struct Endpoint<'a> {
    pub api_key: &'a str,
    pub base_url: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct TomlConfigRaw {
    api_key: Option<String>,
    base_url: Option<String>,
    custom_models: Option<Vec<String>>,
    log_level: Option<String>,
    request_timeout: Option<u64>,
    stream_request_timeout: Option<u64>,
    legacy_retry_matching: Option<bool>,
    custom_headers: Option<HashMap<String, String>>,
}

impl Config {
    pub fn load() -> Result<Self, String> {
        Self::load_from("config.toml")
    }

    pub fn load_from(path: &str) -> Result<Self, String> {
        let toml_config = read_toml_config(path)?.unwrap_or_default();

        let api_key = non_blank(env::var("OPENAI_API_KEY").ok().or(toml_config.api_key));
        let base_url = non_blank(env::var("OPENAI_BASE_URL").ok().or(toml_config.base_url));

        let custom_models = env::var("CUSTOM_MODELS")
            .ok()
            .map(|value| parse_model_list(&value))
            .or(toml_config.custom_models)
            .unwrap_or_default();

        let log_level = env::var("LOG_LEVEL")
            .ok()
            .or(toml_config.log_level)
            .unwrap_or_else(|| "INFO".to_string());

        let request_timeout =
            env_u64_with_fallback("REQUEST_TIMEOUT", toml_config.request_timeout.unwrap_or(90));

        let stream_request_timeout = env_optional_u64("STREAM_REQUEST_TIMEOUT")
            .or(toml_config.stream_request_timeout)
            .filter(|value| *value > 0);

        let legacy_retry_matching = env_bool_with_fallback(
            "LEGACY_RETRY_MATCHING",
            toml_config.legacy_retry_matching.unwrap_or(false),
        );

        let mut custom_headers = toml_config.custom_headers.unwrap_or_default();
        custom_headers.extend(collect_custom_headers());

        Ok(Self {
            api_key,
            base_url,
            custom_models,
            log_level,
            request_timeout,
            stream_request_timeout,
            legacy_retry_matching,
            custom_headers,
        })
    }

    pub fn endpoint(&self) -> Result<Endpoint<'_>, BridgeError> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| BridgeError::Configuration("API key is not configured".to_string()))?;
        let base_url = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| BridgeError::Configuration("base URL is not configured".to_string()))?;

        Ok(Endpoint { api_key, base_url })
    }

    pub fn is_known_model(&self, model_id: &str) -> bool {
        self.custom_models.is_empty() || self.custom_models.iter().any(|model| model == model_id)
    }
}

fn read_toml_config(path: &str) -> Result<Option<TomlConfigRaw>, String> {
    let config_path = Path::new(path);

    if !config_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(config_path)
        .map_err(|error| format!("Failed to read {}: {}", config_path.display(), error))?;

    let parsed = toml::from_str::<TomlConfigRaw>(&content)
        .map_err(|error| format!("Failed to parse {}: {}", config_path.display(), error))?;

    Ok(Some(parsed))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn parse_model_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn collect_custom_headers() -> HashMap<String, String> {
    let mut custom_headers = HashMap::new();
    for (env_key, env_value) in env::vars() {
        let Some(header_raw) = env_key.strip_prefix("CUSTOM_HEADER_") else {
            continue;
        };
        if header_raw.is_empty() {
            continue;
        }
        custom_headers.insert(header_raw.replace('_', "-"), env_value);
    }
    custom_headers
}

fn env_u64_with_fallback(key: &str, fallback: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn env_optional_u64(key: &str) -> Option<u64> {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
}

fn env_bool_with_fallback(key: &str, fallback: bool) -> bool {
    env::var(key)
        .ok()
        .map(|value| parse_bool_flag(&value))
        .unwrap_or(fallback)
}

fn parse_bool_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
