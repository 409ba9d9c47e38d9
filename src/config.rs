use std::env;
use std::time::Duration;

use anyhow::{Context, Result, ensure};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_FUN_FACT_INTERVAL_MS: u64 = 15_000;
pub const DEFAULT_FILE_LOG_FILTER: &str = "debug";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioSettings {
    pub api_base_url: String,
    pub auth_token: Option<String>,
    pub request_timeout_ms: u64,
    pub fun_fact_interval_ms: u64,
}

impl StudioSettings {
    pub fn from_env() -> Result<Self> {
        // Load .env if present, but do not fail if file does not exist.
        let _ = dotenvy::dotenv();

        let api_base_url =
            env::var("NAIL_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_owned());
        let api_base_url = api_base_url.trim().to_owned();
        ensure!(
            !api_base_url.is_empty(),
            "NAIL_API_BASE_URL cannot be empty"
        );
        ensure!(
            api_base_url.starts_with("http://") || api_base_url.starts_with("https://"),
            "NAIL_API_BASE_URL must start with http:// or https://, got `{api_base_url}`"
        );

        let auth_token = read_optional_env("NAIL_AUTH_TOKEN");

        let request_timeout_ms =
            parse_u64_env("NAIL_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?;
        ensure!(
            request_timeout_ms > 0,
            "NAIL_REQUEST_TIMEOUT_MS must be greater than 0"
        );

        let fun_fact_interval_ms =
            parse_u64_env("NAIL_FUN_FACT_INTERVAL_MS", DEFAULT_FUN_FACT_INTERVAL_MS)?;
        ensure!(
            fun_fact_interval_ms > 0,
            "NAIL_FUN_FACT_INTERVAL_MS must be greater than 0"
        );

        Ok(Self {
            api_base_url,
            auth_token,
            request_timeout_ms,
            fun_fact_interval_ms,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn fun_fact_interval(&self) -> Duration {
        Duration::from_millis(self.fun_fact_interval_ms)
    }
}

impl Default for StudioSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            auth_token: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            fun_fact_interval_ms: DEFAULT_FUN_FACT_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLogSettings {
    pub directory: String,
    pub filter: String,
}

impl FileLogSettings {
    pub fn from_env() -> Option<Self> {
        let directory = read_optional_env("NAIL_LOG_DIR")?;
        let filter = read_optional_env("NAIL_FILE_LOG")
            .unwrap_or_else(|| DEFAULT_FILE_LOG_FILTER.to_owned());
        Some(Self { directory, filter })
    }
}

fn read_optional_env(name: &str) -> Option<String> {
    env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    })
}

fn parse_u64_env(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("failed to parse {name} as u64")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_API_BASE_URL, StudioSettings};

    #[test]
    fn default_settings_point_at_local_backend() {
        let settings = StudioSettings::default();
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
        assert!(settings.auth_token.is_none());
        assert_eq!(settings.request_timeout().as_millis(), 120_000);
        assert_eq!(settings.fun_fact_interval().as_secs(), 15);
    }
}
