mod auth;
mod llm;
mod observability;
mod quota;
mod server;

pub use auth::*;
pub use llm::*;
pub use observability::*;
pub use quota::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        // ── auth ──
        if self.auth.is_dev_mode() {
            errors.push(ConfigError::warning(
                "auth.users",
                format!(
                    "no users configured; every request is attributed to \"{}\"",
                    self.auth.dev_user
                ),
            ));
        }
        let mut seen = HashSet::new();
        for (i, user) in self.auth.users.iter().enumerate() {
            if user.id.trim().is_empty() {
                errors.push(ConfigError::error(format!("auth.users[{i}].id"), "user id must not be empty"));
            } else if !seen.insert(user.id.as_str()) {
                errors.push(ConfigError::error(
                    format!("auth.users[{i}].id"),
                    format!("duplicate user id \"{}\"", user.id),
                ));
            }
            match (&user.token_sha256, &user.token_env) {
                (None, None) => errors.push(ConfigError::error(
                    format!("auth.users[{i}]"),
                    "one of token_sha256 or token_env is required",
                )),
                (Some(hash), _) if !is_sha256_hex(hash) => {
                    errors.push(ConfigError::error(
                        format!("auth.users[{i}].token_sha256"),
                        "must be 64 hex characters",
                    ))
                }
                _ => {}
            }
        }

        // ── llm ──
        if self.llm.providers.is_empty() {
            errors.push(ConfigError::warning("llm.providers", "no LLM providers configured"));
        }
        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].id"),
                    "provider id must not be empty",
                ));
            }
            if provider.base_url.is_empty() {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].base_url"),
                    "provider base_url must not be empty",
                ));
            }
        }
        if !self.llm.providers.is_empty()
            && !self.llm.providers.iter().any(|p| p.id == self.llm.default_provider)
        {
            errors.push(ConfigError::error(
                "llm.default_provider",
                format!("\"{}\" is not a configured provider", self.llm.default_provider),
            ));
        }

        // ── quota ──
        let policies = self.quota.model_policies();
        if !policies.contains_key(&self.quota.fallback_model) {
            errors.push(ConfigError::error(
                "quota.fallback_model",
                format!("no policy for fallback model \"{}\"", self.quota.fallback_model),
            ));
        }
        if !policies.contains_key(&self.llm.default_model) {
            errors.push(ConfigError::warning(
                "llm.default_model",
                format!(
                    "no quota policy for \"{}\"; the fallback policy will apply",
                    self.llm.default_model
                ),
            ));
        }
        if self.quota.retention_days == 0 {
            errors.push(ConfigError::error(
                "quota.retention_days",
                "retention must be at least 1 day (daily windows need 24h of history)",
            ));
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::error(
                "observability.sample_rate",
                "sample_rate must be between 0.0 and 1.0",
            ));
        }

        errors
    }
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], field: &str) -> bool {
        errors
            .iter()
            .any(|e| e.severity == ConfigSeverity::Error && e.field == field)
    }

    #[test]
    fn default_config_has_only_warnings() {
        let errors = Config::default().validate();
        assert!(errors.iter().all(|e| e.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn user_without_token_is_rejected() {
        let cfg: Config = toml::from_str(
            r#"
            [[auth.users]]
            id = "alice"
        "#,
        )
        .unwrap();
        assert!(has_error(&cfg.validate(), "auth.users[0]"));
    }

    #[test]
    fn bad_token_hash_is_rejected() {
        let cfg: Config = toml::from_str(
            r#"
            [[auth.users]]
            id = "alice"
            token_sha256 = "not-a-hash"
        "#,
        )
        .unwrap();
        assert!(has_error(&cfg.validate(), "auth.users[0].token_sha256"));
    }

    #[test]
    fn duplicate_user_ids_are_rejected() {
        let cfg: Config = toml::from_str(
            r#"
            [[auth.users]]
            id = "alice"
            token_env = "A"

            [[auth.users]]
            id = "alice"
            token_env = "B"
        "#,
        )
        .unwrap();
        assert!(has_error(&cfg.validate(), "auth.users[1].id"));
    }

    #[test]
    fn unknown_fallback_model_is_rejected() {
        let cfg: Config = toml::from_str(
            r#"
            [quota]
            fallback_model = "nope"
        "#,
        )
        .unwrap();
        assert!(has_error(&cfg.validate(), "quota.fallback_model"));
    }

    #[test]
    fn default_provider_must_exist() {
        let cfg: Config = toml::from_str(
            r#"
            [llm]
            default_provider = "groq"

            [[llm.providers]]
            id = "ollama"
            base_url = "http://localhost:11434/v1"
        "#,
        )
        .unwrap();
        assert!(has_error(&cfg.validate(), "llm.default_provider"));
    }
}
