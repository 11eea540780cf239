//! Web search tool for public and external information.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{text_arg, RawResult, Tool};
use crate::search::WebSearchClient;

pub const WEB_SEARCH_TOOL: &str = "WebSearch";

/// Search the web through the shared search client.
pub struct WebSearchTool {
    client: Arc<WebSearchClient>,
}

impl WebSearchTool {
    pub fn new(client: Arc<WebSearchClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Search the web for public or external information: latest news, industry trends, best practices, public laws, or anything about external companies and regions."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, input: Value, cancel: &CancellationToken) -> anyhow::Result<RawResult> {
        let query = text_arg(&input, "query")
            .ok_or_else(|| anyhow::anyhow!("Missing 'query' argument"))?;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => anyhow::bail!("search cancelled"),
            result = self.client.search(&query) => result,
        };

        Ok(RawResult::answer(result.answer, WEB_SEARCH_TOOL, result.citations))
    }
}
