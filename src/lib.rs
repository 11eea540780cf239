//! # Annet
//!
//! An HR research assistant that answers employee questions about company
//! policy, insurance coverage and public HR regulations.
//!
//! This library provides:
//! - An HTTP API for asking questions and managing the policy index
//! - A tool-routing agent loop that picks a knowledge source per question
//! - Tools for internal policy retrieval, web search and insurance documents
//! - Integration with OpenRouter (or any OpenAI-compatible API) for LLM access
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Receive a question via the API
//! 2. Ask the decision step for a tool call or a final answer
//! 3. Run the tool, record the step, and repeat
//! 4. Credit the last tool used and append its references to the answer
//!
//! ## Example
//!
//! ```rust,ignore
//! use annet::{api::AppState, config::Config};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = Config::from_env()?;
//! let state = AppState::from_config(&config)?;
//! let answer = state.agent.run("How many days of annual leave do I get?", &CancellationToken::new()).await?;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod docs;
pub mod llm;
pub mod retrieval;
pub mod search;
pub mod tools;

pub use config::Config;
