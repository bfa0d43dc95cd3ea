use cg_domain::error::Result;
use cg_domain::tool::{Message, ToolCall, ToolChoice, ToolDefinition};
use cg_domain::usage::TokenUsage;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic chat completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// The conversation messages to send.
    pub messages: Vec<Message>,
    /// Tool definitions the model may invoke.
    pub tools: Vec<ToolDefinition>,
    /// Whether the model may pick freely among `tools` or must call one.
    pub tool_choice: ToolChoice,
    /// Sampling temperature (0.0 – 2.0). `None` lets the provider choose.
    pub temperature: Option<f32>,
    /// Maximum tokens in the response. `None` lets the provider choose.
    pub max_tokens: Option<u32>,
    /// Model identifier override. When `None`, the provider uses its default.
    pub model: Option<String>,
}

impl ChatRequest {
    /// A request with no tools.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Attach one tool and force the model to call it.
    pub fn forcing_tool(mut self, tool: ToolDefinition) -> Self {
        self.tool_choice = ToolChoice::Function {
            name: tool.name.clone(),
        };
        self.tools = vec![tool];
        self
    }
}

/// A provider-agnostic chat completion response.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Textual content of the response. Empty when the model only called tools.
    pub content: String,
    /// Tool calls emitted by the model.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage information.
    pub usage: Option<TokenUsage>,
    /// The model that actually produced the response.
    pub model: String,
    /// The reason the model stopped generating (e.g. "stop", "tool_calls").
    pub finish_reason: Option<String>,
}

impl ChatResponse {
    /// Total tokens billed for this completion, `0` when the provider did
    /// not report usage.
    pub fn total_tokens(&self) -> u64 {
        self.usage.map(|u| u64::from(u.total_tokens)).unwrap_or(0)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait that every LLM adapter must implement.
///
/// Adapters translate between our internal types and a provider's HTTP wire
/// format. The gateway never retries a failed call.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and wait for the full response.
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
