use serde::{Deserialize, Serialize};

/// OpenTelemetry export settings.
///
/// With no `otlp_endpoint` only the JSON log layer is installed. Setting one
/// forwards every `tracing` span to an OTLP/gRPC collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    /// `service.name` resource attribute.
    #[serde(default = "d_service_name")]
    pub service_name: String,
    /// `TraceIdRatioBased` sampling ratio in `[0.0, 1.0]`.
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: d_service_name(),
            sample_rate: d_sample_rate(),
        }
    }
}

fn d_service_name() -> String {
    "concierge".into()
}

fn d_sample_rate() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_export() {
        let cfg: ObservabilityConfig = toml::from_str("").unwrap();
        assert!(cfg.otlp_endpoint.is_none());
        assert_eq!(cfg.service_name, "concierge");
        assert!((cfg.sample_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_endpoint() {
        let cfg: ObservabilityConfig = toml::from_str(
            r#"
            otlp_endpoint = "http://localhost:4317"
            sample_rate = 0.25
        "#,
        )
        .unwrap();
        assert_eq!(cfg.otlp_endpoint.as_deref(), Some("http://localhost:4317"));
        assert!((cfg.sample_rate - 0.25).abs() < f64::EPSILON);
    }
}
