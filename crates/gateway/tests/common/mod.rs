//! Shared fixtures: a scripted provider and an in-memory gateway.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use sha2::{Digest, Sha256};
use tower::ServiceExt;

use cg_domain::config::{ApiUser, Config};
use cg_domain::error::{Error, Result};
use cg_domain::tool::ToolCall;
use cg_domain::usage::TokenUsage;
use cg_gateway::{api, bootstrap};
use cg_ledger::InMemoryUsageStore;
use cg_providers::registry::ProviderRegistry;
use cg_providers::{ChatRequest, ChatResponse, LlmProvider};

pub const ALICE_TOKEN: &str = "alice-token";
pub const BOB_TOKEN: &str = "bob-token";

// ── Scripted provider ────────────────────────────────────────────────

/// Credential echoed by the simulated upstream when the script runs out.
pub const UPSTREAM_SECRET: &str = "gsk_live_abc123";

pub struct ScriptedProvider {
    id: String,
    replies: Mutex<VecDeque<Result<ChatResponse>>>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(id: &str, replies: Vec<Result<ChatResponse>>) -> Self {
        Self {
            id: id.into(),
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.seen.lock().unwrap().push(req.clone());
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(Error::Provider {
                provider: self.id.clone(),
                message: format!(
                    r#"HTTP 401 - {{"error":{{"message":"Invalid API Key {UPSTREAM_SECRET}"}}}}"#
                ),
            })
        })
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

fn usage(tokens: u32) -> Option<TokenUsage> {
    Some(TokenUsage {
        prompt_tokens: 0,
        completion_tokens: tokens,
        total_tokens: tokens,
    })
}

pub fn text(content: &str, tokens: u32) -> ChatResponse {
    ChatResponse {
        content: content.into(),
        usage: usage(tokens),
        ..Default::default()
    }
}

/// A 2xx reply whose body had no usable choice.
pub fn malformed(provider: &str) -> Result<ChatResponse> {
    Err(Error::Protocol {
        provider: provider.into(),
        message: "no choices in response".into(),
    })
}

pub fn tool(name: &str, arguments: serde_json::Value, tokens: u32) -> ChatResponse {
    ChatResponse {
        tool_calls: vec![ToolCall {
            call_id: "call_0".into(),
            tool_name: name.into(),
            arguments,
        }],
        usage: usage(tokens),
        ..Default::default()
    }
}

// ── Gateway fixture ──────────────────────────────────────────────────

pub struct Gateway {
    pub app: Router,
    pub store: InMemoryUsageStore,
    pub provider: Arc<ScriptedProvider>,
}

/// Config with two users (alice, bob) authenticated by SHA-256 digests.
pub fn secured_config() -> Config {
    let mut config = Config::default();
    config.auth.users = [("alice", ALICE_TOKEN), ("bob", BOB_TOKEN)]
        .into_iter()
        .map(|(id, token)| ApiUser {
            id: id.into(),
            token_sha256: Some(hex::encode(Sha256::digest(token.as_bytes()))),
            token_env: None,
        })
        .collect();
    config
}

/// Build the router over an in-memory ledger and a scripted default provider.
pub fn gateway(config: Config, replies: Vec<ChatResponse>) -> Gateway {
    gateway_scripted(config, replies.into_iter().map(Ok).collect())
}

/// Like [`gateway`], but the script may include provider errors.
pub fn gateway_scripted(config: Config, replies: Vec<Result<ChatResponse>>) -> Gateway {
    let provider = Arc::new(ScriptedProvider::new(&config.llm.default_provider, replies));
    let mut registry = ProviderRegistry::default();
    registry.insert(provider.clone());
    build(config, registry, provider)
}

/// Build the router with no LLM provider registered.
pub fn gateway_without_llm(config: Config) -> Gateway {
    let provider = Arc::new(ScriptedProvider::new("unregistered", vec![]));
    build(config, ProviderRegistry::default(), provider)
}

fn build(config: Config, registry: ProviderRegistry, provider: Arc<ScriptedProvider>) -> Gateway {
    let store = InMemoryUsageStore::new();
    let state = bootstrap::assemble(Arc::new(config), registry, Arc::new(store.clone()))
        .expect("state assembles");
    let app = api::router(state.clone()).with_state(state);
    Gateway {
        app,
        store,
        provider,
    }
}

// ── Requests ─────────────────────────────────────────────────────────

pub fn post_json(uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Send one request and decode the JSON body.
pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
