//! API authentication middleware.
//!
//! Bearer tokens map to user ids. Each `[[auth.users]]` entry supplies either
//! the hex SHA-256 digest of its token or the name of an env var holding the
//! plaintext token; the env var is read **once at startup** and only its
//! digest is kept.
//! - Every protected request must carry `Authorization: Bearer <token>`.
//! - If no users are configured the server runs in dev mode: every caller is
//!   treated as `auth.dev_user` and a warning is logged once at startup.

use anyhow::Context;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use cg_domain::config::AuthConfig;

use crate::state::AppState;

/// The authenticated caller, inserted as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

fn sha256(token: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(token.as_bytes()));
    out
}

#[derive(Debug, Clone)]
struct TokenEntry {
    user_id: String,
    digest: [u8; 32],
}

/// Token digests keyed to user ids.
#[derive(Debug, Clone, Default)]
pub struct UserTokens {
    entries: Vec<TokenEntry>,
    dev_user: Option<String>,
}

impl UserTokens {
    pub fn from_config(auth: &AuthConfig) -> anyhow::Result<Self> {
        if auth.is_dev_mode() {
            tracing::warn!(
                dev_user = %auth.dev_user,
                "no [[auth.users]] configured: every request is treated as the dev user"
            );
            return Ok(Self {
                entries: Vec::new(),
                dev_user: Some(auth.dev_user.clone()),
            });
        }

        let mut entries = Vec::with_capacity(auth.users.len());
        for user in &auth.users {
            let digest = match (&user.token_sha256, &user.token_env) {
                (Some(hex_digest), _) => {
                    let bytes = hex::decode(hex_digest.trim())
                        .with_context(|| format!("auth user '{}': token_sha256 is not hex", user.id))?;
                    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
                        anyhow::anyhow!("auth user '{}': token_sha256 must be 32 bytes", user.id)
                    })?
                }
                (None, Some(env_var)) => {
                    let token = std::env::var(env_var)
                        .ok()
                        .filter(|t| !t.is_empty())
                        .with_context(|| {
                            format!("auth user '{}': env var {env_var} is unset or empty", user.id)
                        })?;
                    sha256(&token)
                }
                (None, None) => anyhow::bail!("auth user '{}' has no token configured", user.id),
            };
            entries.push(TokenEntry {
                user_id: user.id.clone(),
                digest,
            });
        }
        tracing::info!(users = entries.len(), "API token auth enabled");
        Ok(Self {
            entries,
            dev_user: None,
        })
    }

    /// Build a table directly from `(user_id, plaintext_token)` pairs.
    pub fn from_plain<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(user_id, token)| TokenEntry {
                    user_id: user_id.to_string(),
                    digest: sha256(token),
                })
                .collect(),
            dev_user: None,
        }
    }

    pub fn dev_user(&self) -> Option<&str> {
        self.dev_user.as_deref()
    }

    /// Look up the user owning `token`. Every entry is compared so timing
    /// does not reveal which one matched.
    pub fn resolve(&self, token: &str) -> Option<&str> {
        let provided = Sha256::digest(token.as_bytes());
        let mut found = None;
        for entry in &self.entries {
            let hit = bool::from(provided.as_slice().ct_eq(&entry.digest));
            if hit && found.is_none() {
                found = Some(entry.user_id.as_str());
            }
        }
        found
    }
}

fn unauthorized(reason: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required",
            "reason": reason,
        })),
    )
        .into_response()
}

/// Axum middleware that resolves the bearer token to an [`AuthUser`].
/// Attach via `axum::middleware::from_fn_with_state`.
pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let user_id = match state.tokens.dev_user() {
        Some(dev) => dev.to_string(),
        None => {
            let provided = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|t| !t.is_empty());

            let Some(token) = provided else {
                return unauthorized("missing bearer token");
            };
            match state.tokens.resolve(token) {
                Some(id) => id.to_string(),
                None => {
                    tracing::debug!("rejected request with unknown API token");
                    return unauthorized("invalid API token");
                }
            }
        }
    };

    req.extensions_mut().insert(AuthUser(user_id));
    next.run(req).await
}
