//! Supervisor dispatch.
//!
//! One classification call decides which specialized agent (if any) handles
//! the message:
//!
//! ```text
//! CLASSIFYING ─┬─> DISPATCHING(agent) ──┐
//!              ├─> ANSWERING_DIRECTLY ──┼─> DONE
//!              └─> UNPARSEABLE ─────────┘
//! ```
//!
//! A forced agent skips classification. There is no retry and no switching
//! agents mid-request.

use std::sync::Arc;

use serde::Serialize;

use cg_domain::error::{Error, Result};
use cg_domain::tool::Message;
use cg_providers::{ChatRequest, LlmProvider};
use cg_tools::ToolRegistry;

use super::agents::{self, AgentContext, AgentId};

/// `agentName` reported when no specialized agent produced the answer.
pub const SUPERVISOR_NAME: &str = "supervisor";

/// Reply used when the classifier returns nothing usable.
pub const UNPARSEABLE_REPLY: &str =
    "Sorry, I could not understand the supervisor's decision. Please rephrase your request.";

const CLASSIFIER_PROMPT: &str = "You are the supervisor that decides which specialized agent \
should handle a request.

Available agents:
1. Calculator agent - mathematical calculations
2. Weather agent - weather information

Analyze the question and pick the most appropriate agent.
Respond with only \"calculator\" or \"weather\".

If the question fits neither agent, explain why and answer it directly.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How a request reached its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Dispatched,
    Forced,
    Direct,
    Unparseable,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Dispatched => "dispatched",
            Route::Forced => "forced",
            Route::Direct => "direct",
            Route::Unparseable => "unparseable",
        }
    }
}

/// Classifier verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Agent(AgentId),
    /// No agent matched; the classifier's own trimmed text is the answer.
    Direct(String),
    Unparseable,
}

/// Map raw classifier output onto a verdict: trim, lowercase, exact match.
pub fn classify_text(raw: &str) -> Classification {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Classification::Unparseable;
    }
    match AgentId::parse(&trimmed.to_lowercase()) {
        Some(agent) => Classification::Agent(agent),
        None => Classification::Direct(trimmed.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub agent_name: String,
    pub response_text: String,
    pub tool_used: Option<String>,
    pub route: Route,
    /// Tokens billed across the classification and agent calls.
    pub tokens: u64,
}

impl DispatchOutcome {
    fn supervisor(text: impl Into<String>, route: Route, tokens: u64) -> Self {
        Self {
            agent_name: SUPERVISOR_NAME.into(),
            response_text: text.into(),
            tool_used: None,
            route,
            tokens,
        }
    }

    /// The agent that handled the request, if any.
    pub fn agent_used(&self) -> Option<&str> {
        match self.route {
            Route::Dispatched | Route::Forced => Some(self.agent_name.as_str()),
            Route::Direct | Route::Unparseable => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Supervisor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Supervisor {
    llm: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
    temperature: f32,
}

impl Supervisor {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: ToolRegistry, temperature: f32) -> Self {
        Self {
            llm,
            tools,
            temperature,
        }
    }

    pub fn provider_id(&self) -> &str {
        self.llm.provider_id()
    }

    /// One classification call. Returns the verdict and the tokens it cost.
    pub async fn classify(&self, model: &str, message: &str) -> Result<(Classification, u64)> {
        let req = ChatRequest::new(vec![
            Message::system(CLASSIFIER_PROMPT),
            Message::user(message),
        ])
        .with_model(model)
        .with_temperature(self.temperature);
        match self.llm.chat(&req).await {
            Ok(resp) => Ok((classify_text(&resp.content), resp.total_tokens())),
            Err(Error::Protocol { provider, message }) => {
                tracing::warn!(provider = %provider, error = %message, "malformed classifier reply");
                Ok((Classification::Unparseable, 0))
            }
            Err(e) => Err(e),
        }
    }

    /// Route one user message to an answer.
    pub async fn route(
        &self,
        model: &str,
        message: &str,
        forced: Option<AgentId>,
    ) -> Result<DispatchOutcome> {
        let (agent, route, mut tokens) = match forced {
            Some(agent) => (agent, Route::Forced, 0),
            None => match self.classify(model, message).await? {
                (Classification::Agent(agent), t) => (agent, Route::Dispatched, t),
                (Classification::Direct(text), t) => {
                    tracing::debug!(route = Route::Direct.as_str(), "supervisor answered directly");
                    return Ok(DispatchOutcome::supervisor(text, Route::Direct, t));
                }
                (Classification::Unparseable, t) => {
                    tracing::warn!(
                        route = Route::Unparseable.as_str(),
                        "classifier returned no usable text"
                    );
                    return Ok(DispatchOutcome::supervisor(UNPARSEABLE_REPLY, Route::Unparseable, t));
                }
            },
        };

        tracing::debug!(agent = %agent, route = route.as_str(), "dispatching to agent");
        let ctx = AgentContext {
            llm: self.llm.as_ref(),
            tools: &self.tools,
            model,
            temperature: self.temperature,
        };
        let reply = agents::respond(agent, &ctx, &[Message::user(message)]).await?;
        tokens = tokens.saturating_add(reply.tokens);

        Ok(DispatchOutcome {
            agent_name: agent.as_str().to_string(),
            response_text: reply.content,
            tool_used: reply.tool_used,
            route,
            tokens,
        })
    }
}
