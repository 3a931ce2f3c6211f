//! Built-in weather and geocoding tools.
//!
//! [`LocationTool`] (`get_lat_long`) geocodes a place name through a
//! Nominatim-compatible search endpoint. [`WeatherTool`] (`get_weather`) fetches
//! current conditions for a coordinate pair from an Open-Meteo-compatible
//! forecast endpoint. Both take their base URL, timeout and user agent from
//! [`PalaverConfig`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use palaver::config::PalaverConfig;
//! use palaver::tools::builtin::default_registry;
//!
//! let registry = default_registry(&PalaverConfig::default()).unwrap();
//! assert_eq!(registry.len(), 2);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::PalaverConfig;
use crate::error::PalaverError;
use crate::tools::arguments::ToolArguments;
use crate::tools::registry::ToolRegistry;
use crate::tools::tool::{Tool, ToolOutput};
use crate::tools::types::SchemaBuilder;
use crate::util::http::{build_client, get_json};

pub const WEATHER_TOOL_NAME: &str = "get_weather";
pub const LOCATION_TOOL_NAME: &str = "get_lat_long";

/// Current weather for a latitude/longitude pair.
#[derive(Debug, Clone)]
pub struct WeatherTool {
    client: reqwest::Client,
    base_url: String,
    schema: serde_json::Value,
}

impl WeatherTool {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            schema: SchemaBuilder::object()
                .string("latitude", "The latitude coordinate as a string.", true)
                .string("longitude", "The longitude coordinate as a string.", true)
                .build(),
        }
    }
}

#[derive(Deserialize)]
struct Coordinates {
    latitude: String,
    longitude: String,
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        WEATHER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Returns weather data for a given latitude and longitude"
    }

    fn input_schema(&self) -> &serde_json::Value {
        &self.schema
    }

    fn result_key(&self) -> &str {
        "weather"
    }

    async fn call(&self, args: &ToolArguments) -> Result<ToolOutput, PalaverError> {
        let coords: Coordinates = args.deserialize()?;
        let url = format!("{}/v1/forecast", self.base_url);
        debug!(%url, latitude = %coords.latitude, longitude = %coords.longitude, "fetching weather");

        let request = self.client.get(url).query(&[
            ("latitude", coords.latitude.trim()),
            ("longitude", coords.longitude.trim()),
            ("current_weather", "true"),
        ]);
        let body = get_json(self.name(), request).await?;
        Ok(ToolOutput::Value(body))
    }
}

/// Geocodes a place name to latitude/longitude.
#[derive(Debug, Clone)]
pub struct LocationTool {
    client: reqwest::Client,
    base_url: String,
    schema: serde_json::Value,
}

impl LocationTool {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            schema: SchemaBuilder::object()
                .string("place", "The place name to geocode and get coordinates for.", true)
                .build(),
        }
    }
}

#[async_trait]
impl Tool for LocationTool {
    fn name(&self) -> &str {
        LOCATION_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Returns the latitude and longitude for a given place name"
    }

    fn input_schema(&self) -> &serde_json::Value {
        &self.schema
    }

    fn result_key(&self) -> &str {
        "location"
    }

    async fn call(&self, args: &ToolArguments) -> Result<ToolOutput, PalaverError> {
        let place = args.get_str("place")?;
        let url = format!("{}/search", self.base_url);
        debug!(%url, place, "geocoding place");

        let request = self
            .client
            .get(url)
            .query(&[("q", place), ("format", "json"), ("limit", "1")]);
        let body = get_json(self.name(), request).await?;

        let matches = body.as_array().ok_or_else(|| {
            PalaverError::external(self.name(), "expected a JSON array of matches")
        })?;
        let Some(first) = matches.first() else {
            return Ok(ToolOutput::Error(format!("No location found for '{place}'")));
        };

        let field = |key: &str| {
            first
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| PalaverError::external(LOCATION_TOOL_NAME, format!("match is missing '{key}'")))
        };
        let mut result = serde_json::json!({
            "latitude": field("lat")?,
            "longitude": field("lon")?,
        });
        if let Some(name) = first.get("display_name").and_then(|v| v.as_str()) {
            result["display_name"] = serde_json::Value::String(name.to_string());
        }
        Ok(ToolOutput::Value(result))
    }
}

/// Registry holding the built-in tools: `get_weather`, then `get_lat_long`.
pub fn default_registry(config: &PalaverConfig) -> Result<ToolRegistry, PalaverError> {
    let client = build_client(config.http_timeout, &config.user_agent)?;
    ToolRegistry::new()
        .with_tool(Arc::new(WeatherTool::new(client.clone(), &config.weather_base_url)))?
        .with_tool(Arc::new(LocationTool::new(client, &config.geocoding_base_url)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    #[test]
    fn weather_spec_requires_both_coordinates() {
        let spec = WeatherTool::new(client(), "http://localhost").spec();

        assert_eq!(spec.name, "get_weather");
        assert_eq!(spec.required_arguments(), vec!["latitude", "longitude"]);
    }

    #[test]
    fn location_spec_describes_geocoding() {
        let spec = LocationTool::new(client(), "http://localhost").spec();

        assert_eq!(spec.name, "get_lat_long");
        assert_eq!(spec.required_arguments(), vec!["place"]);
        assert!(!spec.description.contains("weather"));
    }

    #[test]
    fn default_registry_orders_weather_first() {
        let registry = default_registry(&PalaverConfig::default()).unwrap();

        let names: Vec<String> = registry.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["get_weather", "get_lat_long"]);
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let tool = WeatherTool::new(client(), "http://localhost:8080/");

        assert_eq!(tool.base_url, "http://localhost:8080");
    }
}
