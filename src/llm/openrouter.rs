//! OpenAI-compatible HTTP client (OpenRouter by default).

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatResponse, LlmClient, ToolCall, ToolSchema};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSchema]>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenRouterClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<R> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error ({}): {}", status, body);
        }

        response
            .json::<R>()
            .await
            .with_context(|| format!("invalid response body from {}", url))
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> anyhow::Result<ChatResponse> {
        let request = ChatRequest {
            model,
            messages,
            tools: tools.filter(|t| !t.is_empty()),
            temperature: 0.0,
        };

        let completion: ChatCompletion = self.post("/chat/completions", &request).await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("LLM response contained no choices"))?;

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls,
        })
    }

    async fn embed(&self, model: &str, inputs: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model,
            input: inputs,
        };
        let mut response: EmbeddingResponse = self.post("/embeddings", &request).await?;
        if response.data.len() != inputs.len() {
            anyhow::bail!(
                "embedding count mismatch: sent {}, received {}",
                inputs.len(),
                response.data.len()
            );
        }

        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn strips_trailing_slash() {
        let client = OpenRouterClient::with_base_url("k".into(), "http://localhost:1234/v1/");
        assert_eq!(client.base_url, "http://localhost:1234/v1");
    }

    #[tokio::test]
    async fn parses_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": { "name": "RAG", "arguments": "{\"query\":\"leave\"}" }
                        }]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client = OpenRouterClient::with_base_url("test-key".into(), &server.uri());
        let response = client
            .chat_completion("m", &[ChatMessage::user("hi")], None)
            .await
            .expect("chat completion");

        let calls = response.tool_calls.expect("tool calls");
        assert_eq!(calls[0].function.name, "RAG");
        assert_eq!(calls[0].function.arguments, "{\"query\":\"leave\"}");
        assert!(response.content.is_none());
    }

    #[tokio::test]
    async fn surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = OpenRouterClient::with_base_url("k".into(), &server.uri());
        let err = client
            .chat_completion("m", &[ChatMessage::user("hi")], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("slow down"));
    }

    #[tokio::test]
    async fn orders_embeddings_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "index": 1, "embedding": [0.0, 1.0] },
                    { "index": 0, "embedding": [1.0, 0.0] }
                ]
            })))
            .mount(&server)
            .await;

        let client = OpenRouterClient::with_base_url("k".into(), &server.uri());
        let vectors = client
            .embed("e", &["a".to_string(), "b".to_string()])
            .await
            .expect("embed");
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }
}
