//! HTTP API for asking questions and managing the backing services.
//!
//! ## Endpoints
//! - `GET  /api/health` - Liveness and registered tools
//! - `POST /api/chat` - Answer a question
//! - `POST /api/index/reset` - Rebuild the HR policy index
//! - `POST /api/search/cache/clear` - Drop cached web search results
//! - `GET  /api/search/status` - Which search engine is active

pub mod types;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::{Agent, AgentError, AgentOptions, LlmDecisionStep};
use crate::config::Config;
use crate::docs::{DocumentSource, GoogleDocsClient};
use crate::llm::{LlmClient, OpenRouterClient};
use crate::retrieval::PolicyIndex;
use crate::search::{SearchStatus, WebSearchClient};
use crate::tools::{InsuranceDocumentTool, InsuranceQueryTool, RagTool, ToolRegistry, WebSearchTool};

use types::{
    CacheClearResponse, ChatRequest, ChatResponse, HealthResponse, IndexResetResponse,
};

/// Shared, read-only services behind the handlers.
pub struct AppState {
    pub agent: Agent,
    pub index: Arc<PolicyIndex>,
    pub search: Arc<WebSearchClient>,
    pub turn_timeout: Duration,
}

impl AppState {
    /// Wire up clients, tools and the agent from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let llm: Arc<dyn LlmClient> = Arc::new(OpenRouterClient::with_base_url(
            config.api_key.clone(),
            &config.llm_base_url,
        ));
        let index = Arc::new(PolicyIndex::new(Arc::clone(&llm), config.retrieval.clone()));
        let search = Arc::new(WebSearchClient::new(config.search.clone())?);
        let docs: Arc<dyn DocumentSource> = Arc::new(GoogleDocsClient::with_base_url(
            config.docs.access_token.clone(),
            &config.docs.base_url,
        ));

        let tools = ToolRegistry::new()
            .with(Arc::new(RagTool::new(
                Arc::clone(&index),
                Arc::clone(&llm),
                config.default_model.clone(),
            )))
            .with(Arc::new(WebSearchTool::new(Arc::clone(&search))))
            .with(Arc::new(InsuranceQueryTool::new(
                Arc::clone(&docs),
                Arc::clone(&llm),
                config.default_model.clone(),
                config.docs.default_document_id.clone(),
            )))
            .with(Arc::new(InsuranceDocumentTool::new(
                docs,
                config.docs.default_document_id.clone(),
            )));

        let decision = Arc::new(LlmDecisionStep::new(llm, config.default_model.clone(), &tools));
        let agent = Agent::new(
            decision,
            tools,
            AgentOptions {
                max_iterations: config.max_iterations,
                tool_timeout: config.tool_timeout,
            },
        );

        Ok(Self {
            agent,
            index,
            search,
            turn_timeout: config.turn_timeout,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/index/reset", post(reset_index))
        .route("/api/search/cache/clear", post(clear_search_cache))
        .route("/api/search/status", get(search_status))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(&config)?);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tools: state
            .agent
            .tools()
            .list_tools()
            .into_iter()
            .map(|t| t.name)
            .collect(),
    })
}

/// Answer one question. The turn is cancelled when the deadline passes or
/// the client goes away.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message is required".to_string()));
    }

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let deadline = cancel.clone();
    let turn_timeout = state.turn_timeout;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(turn_timeout) => {
                tracing::warn!("Turn deadline of {:?} reached", turn_timeout);
                deadline.cancel();
            }
            _ = deadline.cancelled() => {}
        }
    });

    match state.agent.run_turn(message, &cancel).await {
        Ok(report) => Ok(Json(report.into())),
        Err(e) => {
            tracing::error!("Turn failed: {}", e);
            Err(agent_error_response(e))
        }
    }
}

fn agent_error_response(error: AgentError) -> (StatusCode, String) {
    let status = match error {
        AgentError::LoopNonTermination { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AgentError::Cancelled { .. } => StatusCode::GATEWAY_TIMEOUT,
        AgentError::DecisionFailed(_) => StatusCode::BAD_GATEWAY,
    };
    (status, error.to_string())
}

async fn reset_index(
    State(state): State<Arc<AppState>>,
) -> Result<Json<IndexResetResponse>, (StatusCode, String)> {
    let chunks = state.index.rebuild().await.map_err(|e| {
        tracing::error!("Policy index rebuild failed: {:#}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
    })?;
    Ok(Json(IndexResetResponse { chunks }))
}

async fn clear_search_cache(State(state): State<Arc<AppState>>) -> Json<CacheClearResponse> {
    Json(CacheClearResponse {
        cleared: state.search.clear_cache().await,
    })
}

async fn search_status(State(state): State<Arc<AppState>>) -> Json<SearchStatus> {
    Json(state.search.status().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{DecisionOutcome, DecisionStep, Step};
    use crate::retrieval::tests::{write_policies, KeywordEmbedder};
    use crate::retrieval::RetrievalConfig;
    use crate::search::SearchConfig;
    use async_trait::async_trait;
    use serde_json::json;

    /// Calls the policy search once, then answers.
    struct PolicyFirst;

    #[async_trait]
    impl DecisionStep for PolicyFirst {
        async fn decide(
            &self,
            input: &str,
            history: &[Step],
            _cancel: &CancellationToken,
        ) -> anyhow::Result<DecisionOutcome> {
            if input == "loop" {
                return Ok(DecisionOutcome::call("nothing", json!("q")));
            }
            if history.is_empty() {
                Ok(DecisionOutcome::call("rag", json!({ "query": input })))
            } else {
                Ok(DecisionOutcome::finish("You get 24 days."))
            }
        }
    }

    fn state(policy_dir: &std::path::Path) -> Arc<AppState> {
        let llm = Arc::new(KeywordEmbedder::default());
        let index = Arc::new(PolicyIndex::new(
            llm.clone(),
            RetrievalConfig::new(policy_dir.to_path_buf(), "embed".into()),
        ));
        let search = Arc::new(WebSearchClient::new(SearchConfig::new(None)).unwrap());
        let tools = ToolRegistry::new().with(Arc::new(RagTool::new(index.clone(), llm, "m".into())));
        let agent = Agent::new(
            Arc::new(PolicyFirst),
            tools,
            AgentOptions {
                max_iterations: 2,
                ..AgentOptions::default()
            },
        );

        Arc::new(AppState {
            agent,
            index,
            search,
            turn_timeout: Duration::from_secs(5),
        })
    }

    #[tokio::test]
    async fn chat_answers_with_attribution() {
        let dir = tempfile::tempdir().unwrap();
        write_policies(dir.path());
        let state = state(dir.path());

        let Json(response) = chat(
            State(state),
            Json(ChatRequest {
                message: "How much leave do I get?".into(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.answer, "You get 24 days.");
        assert_eq!(response.tool.as_deref(), Some("RAG"));
        assert_eq!(response.source.as_deref(), Some("Internal HR Policy Search"));
        assert_eq!(response.citations, ["leave.txt"]);
        assert_eq!(response.iterations, 2);
        assert!(response.display.ends_with("_Source: Internal HR Policy Search_"));
    }

    #[tokio::test]
    async fn chat_rejects_empty_message() {
        let dir = tempfile::tempdir().unwrap();
        let err = chat(State(state(dir.path())), Json(ChatRequest { message: "  ".into() }))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_reports_non_termination() {
        let dir = tempfile::tempdir().unwrap();
        let err = chat(State(state(dir.path())), Json(ChatRequest { message: "loop".into() }))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.1.contains("Max iterations (2)"));
    }

    #[tokio::test]
    async fn reset_index_counts_chunks() {
        let dir = tempfile::tempdir().unwrap();
        write_policies(dir.path());
        let Json(response) = reset_index(State(state(dir.path()))).await.unwrap();
        assert_eq!(response.chunks, 2);
    }

    #[tokio::test]
    async fn reset_index_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = reset_index(State(state(&dir.path().join("missing"))))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.1.contains("policy directory not found"));
    }

    #[test]
    fn agent_errors_map_to_status_codes() {
        assert_eq!(
            agent_error_response(AgentError::Cancelled { iterations: 1 }).0,
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            agent_error_response(AgentError::DecisionFailed(anyhow::anyhow!("down"))).0,
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn search_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let Json(status) = search_status(State(state.clone())).await;
        assert_eq!(status.api_key_status, "not configured");
        let Json(cleared) = clear_search_cache(State(state)).await;
        assert_eq!(cleared.cleared, 0);
    }
}
