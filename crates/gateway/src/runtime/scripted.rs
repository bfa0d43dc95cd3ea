//! In-process provider double that replays canned responses.

use std::collections::VecDeque;
use std::sync::Mutex;

use cg_domain::error::{Error, Result};
use cg_domain::tool::ToolCall;
use cg_domain::usage::TokenUsage;
use cg_providers::{ChatRequest, ChatResponse, LlmProvider};
use serde_json::Value;

pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ChatResponse>>>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<ChatResponse>) -> Self {
        Self::with_results(replies.into_iter().map(Ok).collect())
    }

    /// Script that may also replay provider errors.
    pub fn with_results(replies: Vec<Result<ChatResponse>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.seen.lock().unwrap().clone()
    }
}

fn usage(tokens: u32) -> Option<TokenUsage> {
    Some(TokenUsage {
        prompt_tokens: 0,
        completion_tokens: tokens,
        total_tokens: tokens,
    })
}

pub fn text_reply(content: &str, tokens: u32) -> ChatResponse {
    ChatResponse {
        content: content.into(),
        usage: usage(tokens),
        model: "test-model".into(),
        finish_reason: Some("stop".into()),
        ..Default::default()
    }
}

pub fn tool_reply(tool: &str, arguments: Value, tokens: u32) -> ChatResponse {
    ChatResponse {
        tool_calls: vec![ToolCall {
            call_id: "call_1".into(),
            tool_name: tool.into(),
            arguments,
        }],
        usage: usage(tokens),
        model: "test-model".into(),
        finish_reason: Some("tool_calls".into()),
        ..Default::default()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.seen.lock().unwrap().push(req.clone());
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(Error::Provider {
                provider: "scripted".into(),
                message: "script exhausted".into(),
            })
        })
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}
