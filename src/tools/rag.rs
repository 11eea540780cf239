//! Internal HR policy search over the document index.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{text_arg, RawResult, Tool};
use crate::llm::LlmClient;
use crate::retrieval::{PolicyIndex, ScoredChunk};

pub const RAG_TOOL: &str = "RAG";

const NO_MATCH_ANSWER: &str =
    "I could not find anything relevant to this question in the internal HR policy documents.";

/// Retrieval-augmented answers from the HR policy documents.
pub struct RagTool {
    index: Arc<PolicyIndex>,
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl RagTool {
    pub fn new(index: Arc<PolicyIndex>, llm: Arc<dyn LlmClient>, model: String) -> Self {
        Self { index, llm, model }
    }
}

#[async_trait]
impl Tool for RagTool {
    fn name(&self) -> &str {
        RAG_TOOL
    }

    fn description(&self) -> &str {
        "Search internal HR policy documents to answer questions about company policies, benefits, reimbursements, leave and internal procedures."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The policy question to look up"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, input: Value, _cancel: &CancellationToken) -> anyhow::Result<RawResult> {
        let query = text_arg(&input, "query")
            .ok_or_else(|| anyhow::anyhow!("Missing 'query' argument"))?;

        let hits = self.index.search(&query).await?;
        if hits.is_empty() {
            return Ok(RawResult::answer(NO_MATCH_ANSWER, RAG_TOOL, Vec::new()));
        }

        let answer = self
            .llm
            .complete(&self.model, &build_prompt(&query, &hits))
            .await?;

        Ok(RawResult::answer(answer, RAG_TOOL, unique_sources(&hits)))
    }
}

fn build_prompt(query: &str, hits: &[ScoredChunk]) -> String {
    let context = hits
        .iter()
        .map(|h| format!("[{}]\n{}", h.chunk.source, h.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Use the following excerpts from internal HR policy documents to answer the question. \
         If the excerpts do not contain the answer, say that you don't know.\n\n\
         {context}\n\nQuestion: {query}\nHelpful answer:"
    )
}

/// Source names in retrieval order, without repeats.
fn unique_sources(hits: &[ScoredChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for hit in hits {
        if !sources.contains(&hit.chunk.source) {
            sources.push(hit.chunk.source.clone());
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::tests::{write_policies, KeywordEmbedder};
    use crate::retrieval::{Chunk, RetrievalConfig};

    fn hit(source: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                source: source.to_string(),
                text: "text".to_string(),
            },
            score: 0.9,
        }
    }

    #[test]
    fn sources_are_deduplicated_in_order() {
        let hits = [hit("b.txt"), hit("a.txt"), hit("b.txt")];
        assert_eq!(unique_sources(&hits), ["b.txt", "a.txt"]);
    }

    #[tokio::test]
    async fn answers_with_citations() {
        let dir = tempfile::tempdir().unwrap();
        write_policies(dir.path());
        let llm = Arc::new(KeywordEmbedder::default());
        let index = Arc::new(PolicyIndex::new(
            llm.clone(),
            RetrievalConfig::new(dir.path().to_path_buf(), "embed".into()),
        ));
        let tool = RagTool::new(index, llm, "model".into());
        let cancel = CancellationToken::new();

        let raw = tool
            .invoke(json!({"query": "Can I reimburse my internet bill?"}), &cancel)
            .await
            .unwrap();
        match raw {
            RawResult::Structured { answer, tool, citations } => {
                assert!(answer.starts_with("synthesized from"));
                assert_eq!(tool.as_deref(), Some(RAG_TOOL));
                assert_eq!(citations.unwrap(), ["finance/expenses.md"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let none = tool.invoke(json!("parking"), &cancel).await.unwrap();
        assert_eq!(none, RawResult::answer(NO_MATCH_ANSWER, RAG_TOOL, Vec::new()));
    }

    #[tokio::test]
    async fn missing_query_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(KeywordEmbedder::default());
        let index = Arc::new(PolicyIndex::new(
            llm.clone(),
            RetrievalConfig::new(dir.path().to_path_buf(), "embed".into()),
        ));
        let tool = RagTool::new(index, llm, "model".into());

        let err = tool
            .invoke(json!({}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing 'query' argument");
    }
}
