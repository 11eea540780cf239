//! The decision step: given the question and the steps so far, pick the
//! next tool call or finish with an answer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::llm::{ChatMessage, FunctionCall, LlmClient, Role, ToolCall, ToolSchema};
use crate::tools::{ToolRegistry, ToolResult};

use super::prompt::build_system_prompt;

/// A tool call requested by the decision step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub input: Value,
}

/// One recorded (invocation, result) pair of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub invocation: ToolInvocation,
    pub result: ToolResult,
}

/// What the decision step wants to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    ToolCall(ToolInvocation),
    /// The final answer. A plain JSON string is the canonical shape; see
    /// [`extract_final_answer`] for what else is tolerated.
    Finish(Value),
}

impl DecisionOutcome {
    pub fn call(tool: impl Into<String>, input: Value) -> Self {
        Self::ToolCall(ToolInvocation {
            tool: tool.into(),
            input,
        })
    }

    pub fn finish(answer: impl Into<String>) -> Self {
        Self::Finish(Value::String(answer.into()))
    }
}

#[async_trait]
pub trait DecisionStep: Send + Sync {
    async fn decide(
        &self,
        input: &str,
        history: &[Step],
        cancel: &CancellationToken,
    ) -> anyhow::Result<DecisionOutcome>;
}

/// Which wrapper a finish payload arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishShape {
    Text,
    List,
    Output,
    ReturnValues,
    /// Not recognized; the answer is the payload serialized as JSON.
    Malformed,
}

/// Pull the answer text out of a finish payload.
///
/// Shapes are tried in order: plain string, non-empty list (first element
/// unwrapped), object with `output`, object with `return_values.output`.
/// Anything else is stringified.
pub fn extract_final_answer(payload: &Value) -> (String, FinishShape) {
    if let Value::String(text) = payload {
        return (text.clone(), FinishShape::Text);
    }

    if let Some(first) = payload.as_array().and_then(|items| items.first()) {
        let (text, shape) = extract_final_answer(first);
        if shape != FinishShape::Malformed && first.as_array().is_none() {
            return (text, FinishShape::List);
        }
    }

    if let Some(output) = payload.get("output") {
        return (value_text(output), FinishShape::Output);
    }

    if let Some(output) = payload
        .get("return_values")
        .and_then(|values| values.get("output"))
    {
        return (value_text(output), FinishShape::ReturnValues);
    }

    (value_text(payload), FinishShape::Malformed)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decision step backed by a tool-calling chat model.
pub struct LlmDecisionStep {
    llm: Arc<dyn LlmClient>,
    model: String,
    system_prompt: String,
    tool_schemas: Vec<ToolSchema>,
}

impl LlmDecisionStep {
    pub fn new(llm: Arc<dyn LlmClient>, model: String, tools: &ToolRegistry) -> Self {
        Self {
            llm,
            model,
            system_prompt: build_system_prompt(tools),
            tool_schemas: tools.get_tool_schemas(),
        }
    }

    fn build_messages(&self, input: &str, history: &[Step]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2 + history.len() * 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.push(ChatMessage::user(input));

        for (i, step) in history.iter().enumerate() {
            let call_id = format!("call_{}", i);
            messages.push(ChatMessage {
                role: Role::Assistant,
                content: None,
                tool_calls: Some(vec![ToolCall {
                    id: call_id.clone(),
                    call_type: "function".to_string(),
                    function: FunctionCall {
                        name: step.invocation.tool.clone(),
                        arguments: step.invocation.input.to_string(),
                    },
                }]),
                tool_call_id: None,
            });
            messages.push(ChatMessage {
                role: Role::Tool,
                content: Some(
                    serde_json::to_string(&step.result).unwrap_or_else(|_| step.result.answer.clone()),
                ),
                tool_calls: None,
                tool_call_id: Some(call_id),
            });
        }

        messages
    }
}

#[async_trait]
impl DecisionStep for LlmDecisionStep {
    async fn decide(
        &self,
        input: &str,
        history: &[Step],
        _cancel: &CancellationToken,
    ) -> anyhow::Result<DecisionOutcome> {
        let messages = self.build_messages(input, history);
        let response = self
            .llm
            .chat_completion(&self.model, &messages, Some(self.tool_schemas.as_slice()))
            .await?;

        // Only the first requested call is executed per iteration.
        if let Some(call) = response.tool_calls.and_then(|calls| calls.into_iter().next()) {
            let arguments = call.function.arguments;
            let input = serde_json::from_str(&arguments).unwrap_or(Value::String(arguments));
            return Ok(DecisionOutcome::call(call.function.name, input));
        }

        match response.content {
            Some(content) if !content.trim().is_empty() => Ok(DecisionOutcome::finish(content)),
            _ => Err(anyhow::anyhow!("LLM returned empty response")),
        }
    }
}
