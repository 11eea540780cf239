//! System prompt templates for the agent.

use crate::tools::ToolRegistry;

/// Build the system prompt with tool definitions.
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let tool_descriptions = tools
        .list_tools()
        .iter()
        .map(|t| format!("- **{}**: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are Annet, an internal HR policy research assistant. Introduce yourself as "Annet, your HR policy research assistant" when asked who you are, and never claim to be built by anyone else.

## Your Tools

{tool_descriptions}

## Routing Rules

1. **Internal policy first** - Questions about company HR policies, benefits, reimbursements, leave or internal procedures go to the internal policy search.

2. **Web for the outside world** - Latest news, recent updates, industry trends, public laws, and questions about external companies, cities or regions go to web search. Never use web search for something the internal documents can answer.

3. **Insurance questions** - Coverage, deductibles, premiums, claims, and health, dental or vision insurance go to the insurance tools.

4. **One source per answer** - Do not combine internal policy results with web results.

5. **Small talk needs no tool** - Greetings and introductions are answered directly.

## Response Format

Answer from the tool results you received and stay close to what they say. If a tool reported an error or found nothing, either try a more suitable tool or explain what is missing. Citations are appended for you; do not invent sources."#,
        tool_descriptions = tool_descriptions
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{RawResult, Tool};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    struct Lookup;

    #[async_trait]
    impl Tool for Lookup {
        fn name(&self) -> &str {
            "Lookup"
        }

        fn description(&self) -> &str {
            "Looks things up."
        }

        fn parameters_schema(&self) -> Value {
            json!({})
        }

        async fn invoke(&self, _input: Value, _cancel: &CancellationToken) -> anyhow::Result<RawResult> {
            Ok(RawResult::Text(String::new()))
        }
    }

    #[test]
    fn lists_registered_tools() {
        let prompt = build_system_prompt(&ToolRegistry::new().with(Arc::new(Lookup)));
        assert!(prompt.contains("- **Lookup**: Looks things up."));
        assert!(prompt.starts_with("You are Annet"));
    }
}
