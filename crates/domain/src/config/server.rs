use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Per-IP token-bucket rate limiting. Disabled when `None`; per-user
    /// model quotas apply regardless.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    /// Maximum in-flight requests across the whole server.
    #[serde(default = "d_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Request bodies above this size are rejected with 413.
    #[serde(default = "d_body_limit")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            cors: CorsConfig::default(),
            rate_limit: None,
            max_concurrent_requests: d_max_concurrent(),
            max_body_bytes: d_body_limit(),
        }
    }
}

/// Per-IP token-bucket rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// One token is added every `1 / requests_per_second` seconds.
    pub requests_per_second: u64,
    /// Maximum tokens in the bucket.
    pub burst_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed for CORS. `["*"]` is permissive.
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_port() -> u16 {
    3000
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_max_concurrent() -> usize {
    256
}
fn d_body_limit() -> usize {
    64 * 1024
}
fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:*".into(), "http://127.0.0.1:*".into()]
}
