//! Runtime configuration (layered: code > env > defaults).

use std::time::Duration;

use bon::Builder;

use crate::error::PalaverError;
use crate::models::ModelSelection;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are AI assistant";
pub const DEFAULT_QUESTION: &str = "What's weather in Beijing ?";
pub const DEFAULT_MAX_TURNS: usize = 20;
pub const DEFAULT_WEATHER_BASE_URL: &str = "https://api.open-meteo.com";
pub const DEFAULT_GEOCODING_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Process-wide settings for a palaver run.
///
/// Every field has a default, so `PalaverConfig::builder().build()` is a valid
/// configuration. [`PalaverConfig::from_env`] overlays the `PALAVER_*` and
/// `AWS_REGION` variables on top of those defaults.
#[derive(Debug, Clone, Builder)]
pub struct PalaverConfig {
    #[builder(into, default = DEFAULT_REGION.to_string())]
    pub region: String,
    #[builder(default)]
    pub model: ModelSelection,
    #[builder(default)]
    pub stream: bool,
    #[builder(into, default = DEFAULT_SYSTEM_PROMPT.to_string())]
    pub system_prompt: String,
    #[builder(default = DEFAULT_MAX_TURNS)]
    pub max_turns: usize,
    #[builder(into, default = DEFAULT_WEATHER_BASE_URL.to_string())]
    pub weather_base_url: String,
    #[builder(into, default = DEFAULT_GEOCODING_BASE_URL.to_string())]
    pub geocoding_base_url: String,
    #[builder(default = Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))]
    pub http_timeout: Duration,
    #[builder(into, default = concat!("palaver/", env!("CARGO_PKG_VERSION")).to_string())]
    pub user_agent: String,
}

impl Default for PalaverConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PalaverConfig {
    /// Load from environment variables, reading `.env` first if present.
    pub fn from_env() -> Result<Self, PalaverError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PalaverError> {
        let mut config = Self::default();

        if let Some(region) = non_empty(lookup("AWS_REGION")) {
            config.region = region;
        }
        if let Some(model) = non_empty(lookup("PALAVER_MODEL")) {
            config.model = model.parse()?;
        }
        if let Some(stream) = non_empty(lookup("PALAVER_STREAM")) {
            config.stream = parse_bool("PALAVER_STREAM", &stream)?;
        }
        if let Some(prompt) = non_empty(lookup("PALAVER_SYSTEM_PROMPT")) {
            config.system_prompt = prompt;
        }
        if let Some(turns) = non_empty(lookup("PALAVER_MAX_TURNS")) {
            config.max_turns = parse_number("PALAVER_MAX_TURNS", &turns)?;
            if config.max_turns == 0 {
                return Err(PalaverError::Configuration(
                    "PALAVER_MAX_TURNS must be at least 1".into(),
                ));
            }
        }
        if let Some(url) = non_empty(lookup("PALAVER_WEATHER_BASE_URL")) {
            config.weather_base_url = url;
        }
        if let Some(url) = non_empty(lookup("PALAVER_GEOCODING_BASE_URL")) {
            config.geocoding_base_url = url;
        }
        if let Some(secs) = non_empty(lookup("PALAVER_HTTP_TIMEOUT_SECS")) {
            config.http_timeout =
                Duration::from_secs(parse_number("PALAVER_HTTP_TIMEOUT_SECS", &secs)?);
        }

        Ok(config)
    }

    /// The Bedrock model id requests are sent to.
    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, PalaverError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PalaverError::Configuration(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, PalaverError> {
    value
        .parse()
        .map_err(|_| PalaverError::Configuration(format!("{key} must be a number, got '{value}'")))
}
