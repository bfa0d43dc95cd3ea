use cg_domain::error::Result;
use cg_domain::tool::ToolDefinition;
use serde_json::{json, Value};

use crate::registry::{required_str, Tool};

pub const NOT_FOUND: &str = "City not found";

const REPORTS: &[(&str, &str)] = &[
    ("Paris", "20°C, Sunny"),
    ("Lyon", "22°C, Cloudy"),
    ("Marseille", "25°C, Clear"),
];

/// Canned report for `city`, matched case-insensitively.
pub fn report_for(city: &str) -> Option<&'static str> {
    let city = city.trim();
    REPORTS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(city))
        .map(|(_, report)| *report)
}

pub struct WeatherTool;

#[async_trait::async_trait]
impl Tool for WeatherTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "weather".into(),
            description: "Get the current weather for a given city".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "city": { "type": "string", "description": "The city name" }
                },
                "required": ["city"]
            }),
        }
    }

    async fn call(&self, args: Value) -> Result<String> {
        let city = required_str("weather", &args, "city")?;
        Ok(report_for(city).unwrap_or(NOT_FOUND).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_cities() {
        assert_eq!(report_for("Paris"), Some("20°C, Sunny"));
        assert_eq!(report_for(" lyon "), Some("22°C, Cloudy"));
        assert_eq!(report_for("Berlin"), None);
    }

    #[tokio::test]
    async fn unknown_city_is_an_observation() {
        let out = WeatherTool.call(json!({"city": "Atlantis"})).await.unwrap();
        assert_eq!(out, NOT_FOUND);
    }
}
