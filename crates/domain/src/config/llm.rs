use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider system
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Per-request HTTP timeout for provider calls.
    #[serde(default = "d_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Startup policy for LLM providers.
    #[serde(default)]
    pub startup_policy: LlmStartupPolicy,
    /// Provider id used for both classification and agent turns.
    #[serde(default = "d_provider")]
    pub default_provider: String,
    /// Model used when a chat request does not name one. This is also the
    /// model id quota is charged against.
    #[serde(default = "d_model")]
    pub default_model: String,
    /// Sampling temperature. Classification wants deterministic output.
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    /// Registered LLM providers (data-driven: adding a provider = adding config).
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: d_timeout_ms(),
            startup_policy: LlmStartupPolicy::AllowNone,
            default_provider: d_provider(),
            default_model: d_model(),
            temperature: d_temperature(),
            providers: Vec::new(),
        }
    }
}

/// Controls how the gateway handles LLM provider initialization at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmStartupPolicy {
    /// Boot even if no provider initializes; chat returns 503 until
    /// credentials are configured. Quota endpoints keep working.
    #[default]
    AllowNone,
    /// Abort startup if no LLM providers successfully initialize.
    RequireOne,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(default)]
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub auth: ProviderAuthConfig,
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI chat-completions wire format (OpenAI, Groq, Ollama, vLLM...).
    #[default]
    OpenaiCompat,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderAuthConfig {
    /// Header name (e.g. "Authorization", "x-api-key").
    #[serde(default)]
    pub header: Option<String>,
    /// Header value prefix (e.g. "Bearer ").
    #[serde(default)]
    pub prefix: Option<String>,
    /// Env var containing the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer `env`).
    #[serde(default)]
    pub key: Option<String>,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_timeout_ms() -> u64 {
    60_000
}
fn d_provider() -> String {
    "groq".into()
}
fn d_model() -> String {
    "meta-llama/llama-4-scout-17b-16e-instruct".into()
}
fn d_temperature() -> f32 {
    0.0
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_config_defaults() {
        let cfg = LlmConfig::default();
        assert_eq!(cfg.default_provider, "groq");
        assert_eq!(cfg.default_model, "meta-llama/llama-4-scout-17b-16e-instruct");
        assert_eq!(cfg.temperature, 0.0);
        assert!(cfg.providers.is_empty());
    }

    #[test]
    fn provider_kind_defaults_to_openai_compat() {
        let json = r#"{
            "providers": [
                { "id": "groq", "base_url": "https://api.groq.com/openai/v1",
                  "auth": { "env": "GROQ_API_KEY" } }
            ]
        }"#;
        let cfg: LlmConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.providers.len(), 1);
        assert_eq!(cfg.providers[0].kind, ProviderKind::OpenaiCompat);
        assert_eq!(cfg.providers[0].auth.env.as_deref(), Some("GROQ_API_KEY"));
        assert_eq!(cfg.startup_policy, LlmStartupPolicy::AllowNone);
    }
}
