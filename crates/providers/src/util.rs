//! Shared utility functions for provider adapters.

use cg_domain::config::ProviderAuthConfig;
use cg_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the API key from a [`ProviderAuthConfig`].
///
/// The plaintext `key` field wins (with a warning), then `env`. Providers
/// with neither configured run unauthenticated (local Ollama, vLLM).
pub(crate) fn resolve_api_key(auth: &ProviderAuthConfig) -> Result<Option<String>> {
    if let Some(ref key) = auth.key {
        tracing::warn!("API key loaded from plaintext config field 'key', prefer 'env'");
        return Ok(Some(key.clone()));
    }

    if let Some(ref env_var) = auth.env {
        return match std::env::var(env_var) {
            Ok(v) if !v.trim().is_empty() => Ok(Some(v)),
            _ => Err(Error::Auth(format!(
                "environment variable '{env_var}' not set or empty"
            ))),
        };
    }

    Ok(None)
}
