//! OpenAI-compatible adapter.
//!
//! Works with Groq, OpenAI, Ollama, vLLM, LM Studio, Together and any other
//! endpoint that follows the OpenAI chat completions contract.

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use cg_domain::config::ProviderConfig;
use cg_domain::error::{Error, Result};
use cg_domain::tool::{Message, Role, ToolCall, ToolChoice, ToolDefinition};
use cg_domain::usage::TokenUsage;
use serde_json::Value;
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: Option<String>,
    auth_header: String,
    auth_prefix: String,
    default_model: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new provider from the deserialized provider config. The API
    /// key is resolved eagerly.
    pub fn from_config(cfg: &ProviderConfig, timeout: Duration) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        let auth_header = cfg
            .auth
            .header
            .clone()
            .unwrap_or_else(|| "Authorization".into());
        let auth_prefix = cfg.auth.prefix.clone().unwrap_or_else(|| "Bearer ".into());

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            auth_header,
            auth_prefix,
            default_model: cfg.default_model.clone(),
            client,
        })
    }

    // ── Internal: build authenticated request builder ──────────────

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        match &self.api_key {
            Some(key) => builder.header(&self.auth_header, format!("{}{}", self.auth_prefix, key)),
            None => builder,
        }
    }

    // ── Internal: build the JSON body ─────────────────────────────

    fn build_chat_body(&self, req: &ChatRequest) -> Result<Value> {
        let model = req
            .model
            .clone()
            .or_else(|| self.default_model.clone())
            .ok_or_else(|| Error::Provider {
                provider: self.id.clone(),
                message: "no model in request and no default_model configured".into(),
            })?;

        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();
        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
            body["tool_choice"] = tool_choice_to_openai(&req.tool_choice);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        Ok(body)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    serde_json::json!({
        "role": role_to_str(msg.role),
        "content": msg.content,
    })
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn tool_choice_to_openai(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => Value::String("auto".into()),
        ToolChoice::Function { name } => serde_json::json!({
            "type": "function",
            "function": { "name": name },
        }),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_chat_response(provider: &str, body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Protocol {
            provider: provider.into(),
            message: "no choices in response".into(),
        })?;

    let message = choice.get("message").ok_or_else(|| Error::Protocol {
        provider: provider.into(),
        message: "no message in choice".into(),
    })?;

    // `content` is null when the model only emitted tool calls.
    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .map(String::from);

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(ChatResponse {
        content,
        tool_calls: parse_openai_tool_calls(message),
        usage: body.get("usage").and_then(parse_openai_usage),
        model,
        finish_reason,
    })
}

fn parse_openai_tool_calls(message: &Value) -> Vec<ToolCall> {
    let Some(arr) = message.get("tool_calls").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|tc| {
            let call_id = tc.get("id")?.as_str()?.to_string();
            let func = tc.get("function")?;
            let tool_name = func.get("name")?.as_str()?.to_string();
            let args_str = func.get("arguments")?.as_str().unwrap_or("{}");
            let arguments: Value =
                serde_json::from_str(args_str).unwrap_or(Value::Object(Default::default()));
            Some(ToolCall {
                call_id,
                tool_name,
                arguments,
            })
        })
        .collect()
}

fn parse_openai_usage(v: &Value) -> Option<TokenUsage> {
    let count = |key: &str| -> Option<u32> {
        let n = v.get(key)?.as_u64()?;
        Some(u32::try_from(n).unwrap_or(u32::MAX))
    };
    Some(TokenUsage {
        prompt_tokens: count("prompt_tokens")?,
        completion_tokens: count("completion_tokens")?,
        total_tokens: count("total_tokens")?,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(req)?;

        tracing::debug!(provider = %self.id, url = %url, "openai_compat chat request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value =
            serde_json::from_str(&resp_text).map_err(|e| Error::Protocol {
                provider: self.id.clone(),
                message: format!("body is not JSON: {e}"),
            })?;
        parse_chat_response(&self.id, &resp_json)
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}
