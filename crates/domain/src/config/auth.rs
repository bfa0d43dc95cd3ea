use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Caller authentication
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bearer-token identities.
///
/// Each user is identified by one token. The token is never stored in the
/// config file in clear: either `token_sha256` holds its hex digest, or
/// `token_env` names an environment variable read once at startup.
///
/// With no users configured the gateway runs in dev mode and every caller is
/// treated as `dev_user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub users: Vec<ApiUser>,
    /// Identity assumed for every request in dev mode.
    #[serde(default = "d_dev_user")]
    pub dev_user: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            dev_user: d_dev_user(),
        }
    }
}

impl AuthConfig {
    pub fn is_dev_mode(&self) -> bool {
        self.users.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiUser {
    pub id: String,
    /// Hex-encoded SHA-256 of the bearer token.
    #[serde(default)]
    pub token_sha256: Option<String>,
    /// Environment variable holding the plaintext bearer token.
    #[serde(default)]
    pub token_env: Option<String>,
}

fn d_dev_user() -> String {
    "local".into()
}
