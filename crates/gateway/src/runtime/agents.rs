//! Specialized agents.
//!
//! Each agent is bound to exactly one tool and its first completion is forced
//! to call it. What comes back is an [`AgentRun`]: either a trace carrying the
//! tool's observation or just the model's final text. [`AgentId::normalize`]
//! turns either shape into the reply text.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use cg_domain::error::{Error, Result};
use cg_domain::tool::{Message, ToolCall};
use cg_providers::{ChatRequest, LlmProvider};
use cg_tools::ToolRegistry;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AgentId
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    Calculator,
    Weather,
}

impl AgentId {
    pub const ALL: [AgentId; 2] = [AgentId::Calculator, AgentId::Weather];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentId::Calculator => "calculator",
            AgentId::Weather => "weather",
        }
    }

    /// Exact match against a known id. Callers normalize first.
    pub fn parse(raw: &str) -> Option<AgentId> {
        Self::ALL.into_iter().find(|id| id.as_str() == raw)
    }

    /// The single tool this agent is bound to.
    pub fn tool_name(self) -> &'static str {
        match self {
            AgentId::Calculator => "calculator",
            AgentId::Weather => "weather",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AgentId::Calculator => "Mathematical calculations",
            AgentId::Weather => "Current weather for a city",
        }
    }

    fn instructions(self) -> &'static str {
        match self {
            AgentId::Calculator => {
                "You are a mathematics expert. Always use the calculator tool for every \
                 calculation and never answer directly. Pass the whole arithmetic expression \
                 as the `expression` argument, for example {\"expression\": \"2 + 2\"}."
            }
            AgentId::Weather => {
                "You are a meteorology expert. Always use the weather tool to look up the \
                 city the user asks about. The tool takes a city name. Once you have the \
                 result, explain the conditions in one or two sentences."
            }
        }
    }

    /// Whether the agent writes a final answer from the observation, or the
    /// reply is templated directly from it.
    fn summarizes(self) -> bool {
        matches!(self, AgentId::Weather)
    }

    /// Turn either run shape into the reply text.
    pub fn normalize(self, run: AgentRun) -> String {
        match (self, run) {
            (AgentId::Calculator, AgentRun::Trace { observation, .. }) => {
                format!("The result of the calculation is: {observation}")
            }
            (AgentId::Weather, AgentRun::Trace { observation, output }) => output
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .unwrap_or(observation),
            (_, AgentRun::Output(text)) => text.trim().to_string(),
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What an agent invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentRun {
    /// The tool ran. `observation` is its last output; `output` is the
    /// model's follow-up answer when the agent asked for one.
    Trace {
        observation: String,
        output: Option<String>,
    },
    /// The model answered without calling the tool.
    Output(String),
}

/// Normalized agent result.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub content: String,
    pub tool_used: Option<String>,
    /// Tokens billed across every completion this agent made.
    pub tokens: u64,
}

/// Everything an agent needs for one invocation.
pub struct AgentContext<'a> {
    pub llm: &'a dyn LlmProvider,
    pub tools: &'a ToolRegistry,
    pub model: &'a str,
    pub temperature: f32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// respond
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn with_instructions(agent: AgentId, history: &[Message]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::system(agent.instructions()));
    messages.extend(history.iter().cloned());
    messages
}

/// Run `agent` over `history` and normalize the result.
pub async fn respond(
    agent: AgentId,
    ctx: &AgentContext<'_>,
    history: &[Message],
) -> Result<AgentReply> {
    let (run, tokens) = invoke(agent, ctx, history).await?;
    Ok(AgentReply {
        content: agent.normalize(run),
        tool_used: Some(agent.tool_name().to_string()),
        tokens,
    })
}

async fn invoke(
    agent: AgentId,
    ctx: &AgentContext<'_>,
    history: &[Message],
) -> Result<(AgentRun, u64)> {
    let tool = ctx.tools.get(agent.tool_name()).ok_or_else(|| Error::Tool {
        tool: agent.tool_name().into(),
        message: "tool not registered".into(),
    })?;

    let messages = with_instructions(agent, history);
    let req = ChatRequest::new(messages.clone())
        .with_model(ctx.model)
        .with_temperature(ctx.temperature)
        .forcing_tool(tool.definition());
    let resp = ctx.llm.chat(&req).await?;
    let mut tokens = resp.total_tokens();

    let Some(call) = pick_call(agent, &resp.tool_calls) else {
        tracing::debug!(agent = %agent, "model answered without calling its tool");
        return Ok((AgentRun::Output(resp.content), tokens));
    };

    let observation = tool.call(call.arguments.clone()).await?;
    tracing::debug!(agent = %agent, tool = %call.tool_name, observation = %observation, "tool observation");

    let output = if agent.summarizes() {
        let mut follow_up = messages;
        follow_up.push(Message::assistant(format!(
            "Called {} with {}",
            call.tool_name,
            compact(&call.arguments)
        )));
        follow_up.push(Message::user(format!(
            "Tool result: {observation}\nAnswer the original question using this result."
        )));
        let req = ChatRequest::new(follow_up)
            .with_model(ctx.model)
            .with_temperature(ctx.temperature);
        let summary = ctx.llm.chat(&req).await?;
        tokens = tokens.saturating_add(summary.total_tokens());
        Some(summary.content)
    } else {
        None
    };

    Ok((AgentRun::Trace { observation, output }, tokens))
}

/// The last call to the agent's own tool; anything else the model tried to
/// call is ignored.
fn pick_call(agent: AgentId, calls: &[ToolCall]) -> Option<&ToolCall> {
    calls.iter().rev().find(|c| c.tool_name == agent.tool_name())
}

fn compact(args: &Value) -> String {
    serde_json::to_string(args).unwrap_or_default()
}
