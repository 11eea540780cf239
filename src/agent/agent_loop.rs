//! Core agent loop implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::tools::{ToolRegistry, ToolResult};

use super::decision::{extract_final_answer, DecisionOutcome, DecisionStep, FinishShape, Step, ToolInvocation};
use super::display::{compose_display, Attribution};

/// Failures that end a turn. Tool problems never do; they become steps.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Max iterations ({max_iterations}) reached without a final answer")]
    LoopNonTermination { max_iterations: usize },

    #[error("Turn cancelled after {iterations} iterations")]
    Cancelled { iterations: usize },

    #[error("Decision step failed: {0:#}")]
    DecisionFailed(anyhow::Error),
}

/// Loop limits.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Decision rounds allowed per turn
    pub max_iterations: usize,

    /// Upper bound for a single tool call
    pub tool_timeout: Duration,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            tool_timeout: Duration::from_secs(30),
        }
    }
}

/// Everything a finished turn produced.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub id: Uuid,
    /// Answer with references and source line appended
    pub display: String,
    /// Bare answer text from the decision step
    pub answer: String,
    pub attribution: Attribution,
    pub steps: Vec<Step>,
    pub iterations: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// The question-routing agent.
pub struct Agent {
    decision: Arc<dyn DecisionStep>,
    tools: ToolRegistry,
    options: AgentOptions,
}

impl Agent {
    pub fn new(decision: Arc<dyn DecisionStep>, tools: ToolRegistry, options: AgentOptions) -> Self {
        Self {
            decision,
            tools,
            options,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Answer `input` and return the display text.
    pub async fn run(&self, input: &str, cancel: &CancellationToken) -> Result<String, AgentError> {
        Ok(self.run_turn(input, cancel).await?.display)
    }

    /// Answer `input` and return the full turn record.
    pub async fn run_turn(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnReport, AgentError> {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("turn", %id);
        self.turn(id, input, cancel).instrument(span).await
    }

    async fn turn(
        &self,
        id: Uuid,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnReport, AgentError> {
        let started_at = Utc::now();
        let mut history: Vec<Step> = Vec::new();

        for iteration in 0..self.options.max_iterations {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled { iterations: iteration });
            }
            tracing::debug!("Agent iteration {}", iteration + 1);

            // Ask for the next action
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(AgentError::Cancelled { iterations: iteration });
                }
                outcome = self.decision.decide(input, &history, cancel) => {
                    outcome.map_err(AgentError::DecisionFailed)?
                }
            };

            match outcome {
                DecisionOutcome::ToolCall(invocation) => {
                    // No decision round left to read the result
                    if iteration + 1 == self.options.max_iterations {
                        tracing::warn!(
                            "Skipping tool {} requested on the last iteration",
                            invocation.tool
                        );
                        break;
                    }

                    // Execute the tool call and record it
                    let result = self.execute_tool_call(&invocation, cancel).await.ok_or(
                        AgentError::Cancelled {
                            iterations: iteration + 1,
                        },
                    )?;
                    tracing::info!(
                        tool = %invocation.tool,
                        credited = %result.tool,
                        citations = result.citations.len(),
                        "Tool step recorded"
                    );
                    history.push(Step { invocation, result });
                }
                DecisionOutcome::Finish(payload) => {
                    // Final answer: unwrap it and attach attribution
                    let (answer, shape) = extract_final_answer(&payload);
                    if shape != FinishShape::Text {
                        tracing::warn!(?shape, "Decision step finished with a non-canonical payload");
                    }

                    let attribution = Attribution::from_history(&history);
                    let display = compose_display(&answer, &attribution);
                    tracing::info!(iterations = iteration + 1, steps = history.len(), "Turn finished");

                    return Ok(TurnReport {
                        id,
                        display,
                        answer,
                        attribution,
                        steps: history,
                        iterations: iteration + 1,
                        started_at,
                        finished_at: Utc::now(),
                    });
                }
            }
        }

        tracing::warn!(
            "Max iterations ({}) reached without completion",
            self.options.max_iterations
        );
        Err(AgentError::LoopNonTermination {
            max_iterations: self.options.max_iterations,
        })
    }

    /// Resolve and run one tool call. `None` means the turn was cancelled.
    async fn execute_tool_call(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancellationToken,
    ) -> Option<ToolResult> {
        let requested = invocation.tool.as_str();
        let Some(tool) = self.tools.resolve(requested) else {
            tracing::warn!("Tool {} not found", requested);
            return Some(ToolResult::not_found(requested));
        };
        tracing::info!("Calling tool {} as {} with input: {}", requested, tool.name(), invocation.input);

        let call = tokio::time::timeout(
            self.options.tool_timeout,
            tool.invoke(invocation.input.clone(), cancel),
        );
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            outcome = call => outcome,
        };

        let result = match outcome {
            Ok(Ok(raw)) => ToolResult::normalize(raw, requested),
            Ok(Err(e)) => {
                tracing::warn!("Tool {} failed: {:#}", requested, e);
                ToolResult::failure(requested, format!("{:#}", e))
            }
            Err(_) => {
                tracing::warn!("Tool {} timed out", requested);
                ToolResult::failure(
                    requested,
                    format!("timed out after {}s", self.options.tool_timeout.as_secs_f32()),
                )
            }
        };
        Some(result)
    }
}
