//! Typed access to tool-use arguments.

use crate::error::PalaverError;

/// The JSON object a tool was invoked with, plus the tool it was meant for.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    tool: String,
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(tool: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            tool: tool.into(),
            value,
        }
    }

    /// Get a required string argument.
    pub fn get_str(&self, key: &str) -> Result<&str, PalaverError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| self.invalid(format!("missing string argument '{key}'")))
    }

    /// Deserialize the whole argument object into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, PalaverError> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| self.invalid(format!("failed to deserialize arguments: {e}")))
    }

    fn invalid(&self, message: String) -> PalaverError {
        PalaverError::InvalidArguments {
            tool: self.tool.clone(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_string_is_invalid_arguments() {
        let args = ToolArguments::new("get_lat_long", json!({"city": "Beijing"}));

        let err = args.get_str("place").unwrap_err();
        assert!(matches!(
            err,
            PalaverError::InvalidArguments { ref tool, .. } if tool == "get_lat_long"
        ));
    }

    #[test]
    fn wrong_type_is_invalid_arguments() {
        let args = ToolArguments::new("get_weather", json!({"latitude": 39.9}));

        assert!(args.get_str("latitude").is_err());
    }

    #[test]
    fn deserializes_into_struct() {
        #[derive(serde::Deserialize)]
        struct Coordinates {
            latitude: String,
            longitude: String,
        }

        let args = ToolArguments::new(
            "get_weather",
            json!({"latitude": "39.9042", "longitude": "116.4074"}),
        );
        let coords: Coordinates = args.deserialize().unwrap();
        assert_eq!(coords.latitude, "39.9042");
        assert_eq!(coords.longitude, "116.4074");
    }
}
