//! Insurance policy documents stored in Google Docs.
//!
//! Only reading is supported. The bearer token is supplied by the caller;
//! obtaining and refreshing it happens outside this crate.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

const GOOGLE_DOCS_BASE_URL: &str = "https://docs.googleapis.com";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("No document ID provided")]
    MissingId,

    #[error("Google Docs access token is not configured")]
    MissingToken,

    #[error("Document {0} not found")]
    NotFound(String),

    #[error("Google Docs API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Something that can return the plain text of a document by ID.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, document_id: &str) -> Result<String, DocumentError>;
}

pub struct GoogleDocsClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct GoogleDocument {
    #[serde(default)]
    body: Option<Body>,
}

#[derive(Deserialize)]
struct Body {
    #[serde(default)]
    content: Vec<StructuralElement>,
}

#[derive(Deserialize)]
struct StructuralElement {
    #[serde(default)]
    paragraph: Option<Paragraph>,
}

#[derive(Deserialize)]
struct Paragraph {
    #[serde(default)]
    elements: Vec<ParagraphElement>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParagraphElement {
    #[serde(default)]
    text_run: Option<TextRun>,
}

#[derive(Deserialize)]
struct TextRun {
    #[serde(default)]
    content: String,
}

impl GoogleDocsClient {
    pub fn new(access_token: Option<String>) -> Self {
        Self::with_base_url(access_token, GOOGLE_DOCS_BASE_URL)
    }

    pub fn with_base_url(access_token: Option<String>, base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
impl DocumentSource for GoogleDocsClient {
    async fn fetch(&self, document_id: &str) -> Result<String, DocumentError> {
        let document_id = document_id.trim();
        if document_id.is_empty() {
            return Err(DocumentError::MissingId);
        }
        let token = self
            .access_token
            .as_deref()
            .ok_or(DocumentError::MissingToken)?;

        tracing::debug!("Fetching Google Doc {}", document_id);
        let url = format!(
            "{}/v1/documents/{}",
            self.base_url,
            urlencoding::encode(document_id)
        );
        let response = self.http.get(&url).bearer_auth(token).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DocumentError::NotFound(document_id.to_string()));
        }
        if !status.is_success() {
            return Err(DocumentError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let document: GoogleDocument = response.json().await?;
        let text = document_text(document);
        tracing::debug!("Retrieved document {} ({} chars)", document_id, text.chars().count());
        Ok(text)
    }
}

fn document_text(document: GoogleDocument) -> String {
    document
        .body
        .map(|b| b.content)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|element| element.paragraph)
        .flat_map(|p| p.elements)
        .filter_map(|e| e.text_run)
        .map(|run| run.content)
        .collect()
}
