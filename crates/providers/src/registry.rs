//! Provider registry.
//!
//! Constructs and holds all configured LLM provider instances. At startup the
//! registry reads the [`LlmConfig`], resolves authentication and instantiates
//! an adapter for each configured provider.

use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;
use cg_domain::config::{LlmConfig, LlmStartupPolicy, ProviderKind};
use cg_domain::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Holds all instantiated LLM providers keyed by config id.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    /// Build the registry from the application's [`LlmConfig`].
    ///
    /// Providers that fail to initialize are logged and skipped. If none
    /// initialize and the startup policy is `require_one`, this errors.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.default_timeout_ms);
        let mut registry = Self::default();

        for pc in &config.providers {
            let result = match pc.kind {
                ProviderKind::OpenaiCompat => OpenAiCompatProvider::from_config(pc, timeout)
                    .map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
            };

            match result {
                Ok(provider) => {
                    tracing::info!(provider_id = %pc.id, kind = ?pc.kind, "registered LLM provider");
                    registry.insert(provider);
                }
                Err(e) => {
                    tracing::warn!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        error = %e,
                        "failed to initialize LLM provider, skipping"
                    );
                }
            }
        }

        if registry.is_empty() {
            if config.startup_policy == LlmStartupPolicy::RequireOne {
                return Err(Error::Config(
                    "no LLM provider initialized and llm.startup_policy = require_one".into(),
                ));
            }
            tracing::warn!("no LLM providers initialized; chat will fail until one is configured");
        }

        Ok(registry)
    }

    /// Register an already-built provider under its own id.
    pub fn insert(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers
            .insert(provider.provider_id().to_string(), provider);
    }

    /// Look up a provider by its config id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// List all registered provider IDs (sorted).
    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }
}
