//! Tool system: the capabilities the agent can route a question to.
//!
//! Every tool takes one free-form JSON input and returns a [`RawResult`].
//! The agent loop normalizes whatever comes back into a [`ToolResult`]
//! before recording it, so tools are free to return plain text.

mod insurance;
mod rag;
mod web;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::llm::{FunctionSchema, ToolSchema};

pub use insurance::{InsuranceDocumentTool, InsuranceQueryTool};
pub use rag::RagTool;
pub use web::WebSearchTool;

/// Tag used when no tool can be credited for a result.
pub const UNKNOWN_TOOL: &str = "Unknown";

/// Trait for all tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name, compared case-insensitively.
    fn name(&self) -> &str;

    /// Description shown to the model when choosing a tool.
    fn description(&self) -> &str;

    /// JSON schema for the input.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. Errors are recorded as failure steps by the caller.
    async fn invoke(&self, input: Value, cancel: &CancellationToken) -> anyhow::Result<RawResult>;
}

/// What a tool hands back before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    Structured {
        answer: String,
        tool: Option<String>,
        citations: Option<Vec<String>>,
    },
    Text(String),
}

impl RawResult {
    /// Structured result credited to `tool`.
    pub fn answer(answer: impl Into<String>, tool: &str, citations: Vec<String>) -> Self {
        Self::Structured {
            answer: answer.into(),
            tool: Some(tool.to_string()),
            citations: Some(citations),
        }
    }
}

/// Normalized tool output as recorded in the turn history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub answer: String,
    pub tool: String,
    pub citations: Vec<String>,
}

impl ToolResult {
    pub fn not_found(requested: &str) -> Self {
        Self {
            answer: format!("Tool {} not found.", requested),
            tool: UNKNOWN_TOOL.to_string(),
            citations: Vec::new(),
        }
    }

    pub fn failure(requested: &str, error: impl std::fmt::Display) -> Self {
        Self {
            answer: format!("Tool {} error: {}", requested, error),
            tool: requested.to_string(),
            citations: Vec::new(),
        }
    }

    /// Fold a raw tool output into the canonical shape.
    ///
    /// Plain text is credited to the tool name the decision step asked for.
    pub fn normalize(raw: RawResult, requested: &str) -> Self {
        match raw {
            RawResult::Structured {
                answer,
                tool,
                citations,
            } => Self {
                answer,
                tool: tool.unwrap_or_else(|| UNKNOWN_TOOL.to_string()),
                citations: citations.unwrap_or_default(),
            },
            RawResult::Text(answer) => Self {
                answer,
                tool: requested.to_string(),
                citations: Vec::new(),
            },
        }
    }
}

impl From<ToolResult> for RawResult {
    fn from(result: ToolResult) -> Self {
        RawResult::Structured {
            answer: result.answer,
            tool: Some(result.tool),
            citations: Some(result.citations),
        }
    }
}

/// Pull a text argument out of a free-form input.
///
/// Accepts either a bare JSON string or an object carrying `key`.
pub fn text_arg(input: &Value, key: &str) -> Option<String> {
    let text = match input {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get(key).and_then(Value::as_str),
        _ => None,
    }?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Information about a tool for the system prompt.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Ordered, read-only set of tools for a turn.
///
/// Registration order decides which tool wins a substring match.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_lowercase();
        if let Some(slot) = self
            .tools
            .iter_mut()
            .find(|t| t.name().to_lowercase() == name)
        {
            tracing::debug!("Replacing tool: {}", tool.name());
            *slot = tool;
        } else {
            tracing::debug!("Registered tool: {}", tool.name());
            self.tools.push(tool);
        }
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Find a tool by exact case-insensitive name, then by substring.
    ///
    /// The requested name is trimmed first, and a blank name matches nothing.
    pub fn resolve(&self, requested: &str) -> Option<Arc<dyn Tool>> {
        let needle = requested.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        self.tools
            .iter()
            .find(|t| t.name().to_lowercase() == needle)
            .or_else(|| {
                self.tools
                    .iter()
                    .find(|t| t.name().to_lowercase().contains(&needle))
            })
            .cloned()
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|t| ToolSchema {
                schema_type: "function".to_string(),
                function: FunctionSchema {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Named(&'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }

        async fn invoke(&self, _input: Value, _cancel: &CancellationToken) -> anyhow::Result<RawResult> {
            Ok(RawResult::Text(self.0.to_string()))
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .with(Arc::new(Named("RAG")))
            .with(Arc::new(Named("WebSearch")))
            .with(Arc::new(Named("InsuranceQuery")))
            .with(Arc::new(Named("InsuranceDocument")))
    }

    #[test]
    fn exact_match_ignores_case() {
        let tools = registry();
        for name in ["RAG", "rag", "Rag", "rAg"] {
            assert_eq!(tools.resolve(name).expect(name).name(), "RAG");
        }
        assert_eq!(tools.resolve("websearch").unwrap().name(), "WebSearch");
        assert_eq!(tools.resolve(" RAG ").unwrap().name(), "RAG");
    }

    #[test]
    fn exact_match_beats_substring() {
        let tools = ToolRegistry::new()
            .with(Arc::new(Named("SearchAll")))
            .with(Arc::new(Named("Search")));
        assert_eq!(tools.resolve("search").unwrap().name(), "Search");
    }

    #[test]
    fn substring_fallback() {
        let tools = registry();
        assert_eq!(tools.resolve("web").unwrap().name(), "WebSearch");
        assert_eq!(tools.resolve("DOCUMENT").unwrap().name(), "InsuranceDocument");
        // Ambiguous: first registered wins.
        assert_eq!(tools.resolve("insurance").unwrap().name(), "InsuranceQuery");
    }

    #[test]
    fn unresolved_names() {
        let tools = registry();
        assert!(tools.resolve("Calculator").is_none());
        assert!(tools.resolve("").is_none());
        assert!(tools.resolve("   ").is_none());
    }

    #[test]
    fn register_replaces_same_name() {
        let mut tools = registry();
        tools.register(Arc::new(Named("rag")));
        assert_eq!(tools.len(), 4);
        assert_eq!(tools.resolve("RAG").unwrap().name(), "rag");
    }

    #[test]
    fn normalize_structured_is_unchanged() {
        let raw = RawResult::answer("a", "RAG", vec!["x".into()]);
        let result = ToolResult::normalize(raw, "whatever");
        assert_eq!(
            result,
            ToolResult {
                answer: "a".into(),
                tool: "RAG".into(),
                citations: vec!["x".into()],
            }
        );
        let again = ToolResult::normalize(result.clone().into(), "other");
        assert_eq!(again, result);
    }

    #[test]
    fn normalize_fills_defaults() {
        let raw = RawResult::Structured {
            answer: "a".into(),
            tool: None,
            citations: None,
        };
        let result = ToolResult::normalize(raw, "rag");
        assert_eq!(result.tool, UNKNOWN_TOOL);
        assert!(result.citations.is_empty());
    }

    #[test]
    fn normalize_text_uses_requested_name() {
        let result = ToolResult::normalize(RawResult::Text("plain".into()), "rag");
        assert_eq!(result.answer, "plain");
        assert_eq!(result.tool, "rag");
        assert!(result.citations.is_empty());
    }

    #[test]
    fn failure_messages() {
        assert_eq!(ToolResult::not_found("Calc").answer, "Tool Calc not found.");
        let failed = ToolResult::failure("web", anyhow::anyhow!("boom"));
        assert_eq!(failed.answer, "Tool web error: boom");
        assert_eq!(failed.tool, "web");
    }

    #[test]
    fn text_arg_shapes() {
        assert_eq!(text_arg(&json!("leave policy"), "query").as_deref(), Some("leave policy"));
        assert_eq!(text_arg(&json!({"query": " pto "}), "query").as_deref(), Some("pto"));
        assert!(text_arg(&json!({"q": "x"}), "query").is_none());
        assert!(text_arg(&json!({"query": ""}), "query").is_none());
        assert!(text_arg(&json!(42), "query").is_none());
    }

    #[test]
    fn schemas_follow_registration_order() {
        let schemas = registry().get_tool_schemas();
        let names: Vec<_> = schemas.iter().map(|s| s.function.name.as_str()).collect();
        assert_eq!(names, ["RAG", "WebSearch", "InsuranceQuery", "InsuranceDocument"]);
        assert_eq!(schemas[0].schema_type, "function");
    }
}
