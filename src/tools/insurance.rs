//! Insurance policy tools backed by Google Docs.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{text_arg, RawResult, Tool};
use crate::docs::DocumentSource;
use crate::llm::LlmClient;

pub const INSURANCE_QUERY_TOOL: &str = "InsuranceQuery";
pub const INSURANCE_DOCUMENT_TOOL: &str = "InsuranceDocument";

/// Characters of a document returned verbatim by [`InsuranceDocumentTool`].
const DOCUMENT_PREVIEW_CHARS: usize = 2000;

/// Answers insurance questions from a policy document.
pub struct InsuranceQueryTool {
    docs: Arc<dyn DocumentSource>,
    llm: Arc<dyn LlmClient>,
    model: String,
    default_document_id: String,
}

impl InsuranceQueryTool {
    pub fn new(
        docs: Arc<dyn DocumentSource>,
        llm: Arc<dyn LlmClient>,
        model: String,
        default_document_id: String,
    ) -> Self {
        Self {
            docs,
            llm,
            model,
            default_document_id,
        }
    }

    /// Fetch the document and ask the model. Fetch problems and model
    /// problems are reported with different prefixes.
    async fn answer(&self, question: &str, document_id: &str) -> String {
        let content = match self.docs.fetch(document_id).await {
            Ok(content) if content.trim().is_empty() => {
                tracing::warn!("Insurance document {} is empty", document_id);
                return format!(
                    "Could not retrieve document content: document {} is empty",
                    document_id
                );
            }
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Fetching insurance document {} failed: {}", document_id, e);
                return format!("Could not retrieve document content: {}", e);
            }
        };

        let prompt = format!(
            "You are an insurance policy expert. Here is the content of the insurance policy document:\n\n\
             {content}\n\n\
             Question: {question}\n\n\
             Answer the question based only on the information in the document above. \
             If the information is not available, state that clearly."
        );
        match self.llm.complete(&self.model, &prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("Insurance query against {} failed: {:#}", document_id, e);
                format!("Error querying insurance documents: {}", e)
            }
        }
    }
}

#[async_trait]
impl Tool for InsuranceQueryTool {
    fn name(&self) -> &str {
        INSURANCE_QUERY_TOOL
    }

    fn description(&self) -> &str {
        "Answer insurance questions (coverage, deductibles, premiums, claims; health, dental or vision) from the employee insurance policy document."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The insurance question"
                },
                "document_id": {
                    "type": "string",
                    "description": "Optional Google Docs ID; defaults to the employee insurance policy"
                }
            },
            "required": ["question"]
        })
    }

    async fn invoke(&self, input: Value, _cancel: &CancellationToken) -> anyhow::Result<RawResult> {
        let question = text_arg(&input, "question")
            .ok_or_else(|| anyhow::anyhow!("Missing 'question' argument"))?;
        let document_id = document_id_arg(&input).unwrap_or_else(|| self.default_document_id.clone());

        let answer = self.answer(&question, &document_id).await;
        Ok(RawResult::answer(answer, INSURANCE_QUERY_TOOL, Vec::new()))
    }
}

/// Returns the beginning of a policy document.
pub struct InsuranceDocumentTool {
    docs: Arc<dyn DocumentSource>,
    default_document_id: String,
}

impl InsuranceDocumentTool {
    pub fn new(docs: Arc<dyn DocumentSource>, default_document_id: String) -> Self {
        Self {
            docs,
            default_document_id,
        }
    }
}

#[async_trait]
impl Tool for InsuranceDocumentTool {
    fn name(&self) -> &str {
        INSURANCE_DOCUMENT_TOOL
    }

    fn description(&self) -> &str {
        "Retrieve the content of a specific insurance policy document from Google Docs by document ID."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "document_id": {
                    "type": "string",
                    "description": "Google Docs document ID"
                }
            },
            "required": ["document_id"]
        })
    }

    async fn invoke(&self, input: Value, _cancel: &CancellationToken) -> anyhow::Result<RawResult> {
        let document_id = document_id_arg(&input).unwrap_or_else(|| self.default_document_id.clone());

        let raw = match self.docs.fetch(&document_id).await {
            Ok(content) if content.trim().is_empty() => RawResult::answer(
                "No content retrieved",
                INSURANCE_DOCUMENT_TOOL,
                vec![format!("Document ID: {}", document_id)],
            ),
            Ok(content) => RawResult::answer(
                truncate_document(&content),
                INSURANCE_DOCUMENT_TOOL,
                vec![format!("Document ID: {}", document_id)],
            ),
            Err(e) => RawResult::answer(
                format!("Error retrieving document: {}", e),
                INSURANCE_DOCUMENT_TOOL,
                Vec::new(),
            ),
        };
        Ok(raw)
    }
}

fn document_id_arg(input: &Value) -> Option<String> {
    text_arg(input, "document_id")
}

fn truncate_document(content: &str) -> String {
    match content.char_indices().nth(DOCUMENT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}... (truncated)", &content[..cut]),
        None => content.to_string(),
    }
}
