//! Agent module - routes a question through tools to a final answer.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Ask the decision step what to do with the question and the steps so far
//! 2. If it requests a tool, resolve it by name, run it and record the result
//! 3. Repeat until the decision step finishes or max iterations are reached
//! 4. Append references and the source of the last step to the answer

mod agent_loop;
mod decision;
mod display;
mod prompt;

pub use agent_loop::{Agent, AgentError, AgentOptions, TurnReport};
pub use decision::{
    extract_final_answer, DecisionOutcome, DecisionStep, FinishShape, LlmDecisionStep, Step,
    ToolInvocation,
};
pub use display::{compose_display, display_name, Attribution};
pub use prompt::build_system_prompt;
