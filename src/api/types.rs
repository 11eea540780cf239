//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{display_name, Step, TurnReport};

/// Question submitted by the user.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user's question
    pub message: String,
}

/// Answer to a question.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    /// Turn identifier (matches the `turn` span in the logs)
    pub id: Uuid,

    /// Markdown ready for display, references and source included
    pub display: String,

    /// Bare answer text
    pub answer: String,

    /// Internal tag of the tool credited with the answer
    pub tool: Option<String>,

    /// Human-readable name of that tool
    pub source: Option<String>,

    pub citations: Vec<String>,

    /// Number of decision rounds used
    pub iterations: usize,

    /// Tool calls made while answering
    pub steps: Vec<Step>,
}

impl From<TurnReport> for ChatResponse {
    fn from(report: TurnReport) -> Self {
        let source = report
            .attribution
            .tool
            .as_deref()
            .map(|t| display_name(t).to_string());
        Self {
            id: report.id,
            display: report.display,
            answer: report.answer,
            tool: report.attribution.tool,
            source,
            citations: report.attribution.citations,
            iterations: report.iterations,
            steps: report.steps,
        }
    }
}

/// Result of rebuilding the policy index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexResetResponse {
    /// Chunks now in the index
    pub chunks: usize,
}

/// Result of clearing the search cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheClearResponse {
    /// Cached queries removed
    pub cleared: usize,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Names of the registered tools
    pub tools: Vec<String>,
}
