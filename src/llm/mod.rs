//! LLM access: chat completions with tool calling, and embeddings.
//!
//! Everything speaks the OpenAI-compatible wire format, so the same client
//! works against OpenRouter, OpenAI or a local gateway.

mod openrouter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openrouter::OpenRouterClient;

/// Message role in a chat completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,

    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,

    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

/// Function name plus its JSON-encoded arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Tool definition advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Assistant reply: text, tool calls, or both.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Chat + embedding capability consumed by the decision step and tools.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> anyhow::Result<ChatResponse>;

    async fn embed(&self, model: &str, inputs: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// Single-prompt convenience used for answer synthesis.
    async fn complete(&self, model: &str, prompt: &str) -> anyhow::Result<String> {
        let response = self
            .chat_completion(model, &[ChatMessage::user(prompt)], None)
            .await?;
        response
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("LLM returned empty response"))
    }
}
