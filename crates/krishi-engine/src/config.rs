use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_WEATHER_API_BASE: &str = "https://api.open-meteo.com/v1";
pub const DEFAULT_PACING_FLOOR: Duration = Duration::from_millis(2_000);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the client sends requests and how it paces them.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base: String,
    pub weather_api_base: String,
    pub bearer_token: Option<String>,
    pub pacing_floor: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            weather_api_base: DEFAULT_WEATHER_API_BASE.to_string(),
            bearer_token: None,
            pacing_floor: DEFAULT_PACING_FLOOR,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Process environment first, then `.env` in the working directory.
    pub fn from_env() -> Result<Self> {
        let dotenv = env::current_dir()
            .map(|dir| load_dotenv(&dir.join(".env")))
            .unwrap_or_default();
        Self::resolve(|key| non_empty_env(key).or_else(|| non_empty(dotenv.get(key).cloned())))
    }

    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(base) = lookup("KRISHI_API_URL")
            .or_else(|| lookup("NEXT_PUBLIC_API_URL"))
            .and_then(|raw| normalize_base(&raw))
        {
            config.api_base = base;
        }
        if let Some(base) = lookup("KRISHI_WEATHER_API_BASE").and_then(|raw| normalize_base(&raw)) {
            config.weather_api_base = base;
        }
        config.bearer_token = non_empty(lookup("KRISHI_API_TOKEN"));
        if let Some(raw) = non_empty(lookup("KRISHI_PACING_FLOOR_MS")) {
            let millis: u64 = raw.parse().with_context(|| {
                format!("KRISHI_PACING_FLOOR_MS must be an integer, got {raw:?}")
            })?;
            config.pacing_floor = Duration::from_millis(millis);
        }
        if let Some(raw) = non_empty(lookup("KRISHI_REQUEST_TIMEOUT_S")) {
            let secs: f64 = raw.parse().with_context(|| {
                format!("KRISHI_REQUEST_TIMEOUT_S must be a number, got {raw:?}")
            })?;
            if !secs.is_finite() || secs <= 0.0 {
                anyhow::bail!("KRISHI_REQUEST_TIMEOUT_S must be positive, got {raw:?}");
            }
            config.request_timeout = Duration::from_secs_f64(secs);
        }
        Ok(config)
    }

    /// Applies a CLI-level base URL override; blank values are ignored.
    pub fn with_api_base(mut self, raw: Option<&str>) -> Self {
        if let Some(base) = raw.and_then(normalize_base) {
            self.api_base = base;
        }
        self
    }

    pub fn with_bearer_token(mut self, raw: Option<&str>) -> Self {
        if let Some(token) = non_empty(raw.map(str::to_string)) {
            self.bearer_token = Some(token);
        }
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }
}

fn normalize_base(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn non_empty_env(key: &str) -> Option<String> {
    non_empty(env::var(key).ok())
}

fn load_dotenv(path: &Path) -> HashMap<String, String> {
    std::fs::read_to_string(path)
        .map(|content| parse_dotenv(&content))
        .unwrap_or_default()
}

pub fn parse_dotenv(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for raw_line in content.lines() {
        let mut line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix("export ") {
            line = stripped.trim();
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let mut value = value.trim().to_string();
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            if (bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
                || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'')
            {
                value = value[1..value.len() - 1].to_string();
            }
        }
        vars.insert(key.to_string(), value);
    }
    vars
}
