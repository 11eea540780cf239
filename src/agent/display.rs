//! Final answer presentation: references block and source line.

use serde::Serialize;

use super::decision::Step;

/// Human-readable labels for internal tool tags.
const DISPLAY_NAMES: [(&str, &str); 4] = [
    ("RAG", "Internal HR Policy Search"),
    ("WebSearch", "Web Search"),
    ("InsuranceQuery", "Insurance Policy Search"),
    ("InsuranceDocument", "Insurance Document Retrieval"),
];

/// Where the final answer came from: the last step of the turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attribution {
    pub tool: Option<String>,
    pub citations: Vec<String>,
}

impl Attribution {
    pub fn from_history(history: &[Step]) -> Self {
        match history.last() {
            Some(step) => Self {
                tool: Some(step.result.tool.clone()).filter(|t| !t.is_empty()),
                citations: step.result.citations.clone(),
            },
            None => Self::default(),
        }
    }
}

/// Label for a tool tag; unknown tags are shown as-is.
pub fn display_name(tag: &str) -> &str {
    DISPLAY_NAMES
        .iter()
        .find(|(internal, _)| *internal == tag)
        .map(|(_, label)| *label)
        .unwrap_or(tag)
}

pub fn compose_display(answer: &str, attribution: &Attribution) -> String {
    let mut display = answer.to_string();

    if !attribution.citations.is_empty() {
        display.push_str("\n\n**References:**\n");
        let bullets = attribution
            .citations
            .iter()
            .map(|c| format!("- {}", c))
            .collect::<Vec<_>>()
            .join("\n");
        display.push_str(&bullets);
    }

    if let Some(tool) = &attribution.tool {
        display.push_str(&format!("\n\n_Source: {}_", display_name(tool)));
    }

    display
}
