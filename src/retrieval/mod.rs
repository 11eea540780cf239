//! HR policy document index.
//!
//! Policy files are loaded from a directory, split into overlapping chunks,
//! embedded through the LLM client and kept in memory. The index is built on
//! first use and can be rebuilt when the documents change.

mod splitter;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::RwLock;
use walkdir::WalkDir;

use crate::llm::LlmClient;

pub use splitter::split_text;

const EMBED_BATCH: usize = 64;
const INDEXED_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Retrieval settings.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Directory holding the policy documents
    pub policy_dir: PathBuf,

    /// Embedding model identifier
    pub embed_model: String,

    /// Maximum hits returned per query
    pub top_k: usize,

    /// Hits scoring below this cosine similarity are dropped
    pub min_score: f32,

    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl RetrievalConfig {
    pub fn new(policy_dir: PathBuf, embed_model: String) -> Self {
        Self {
            policy_dir,
            embed_model,
            top_k: 4,
            min_score: 0.7,
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// A piece of a policy document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Path of the source file, relative to the policy directory
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

struct IndexState {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

/// In-memory vector index over the policy documents.
pub struct PolicyIndex {
    llm: Arc<dyn LlmClient>,
    config: RetrievalConfig,
    state: RwLock<Option<Arc<IndexState>>>,
}

impl PolicyIndex {
    pub fn new(llm: Arc<dyn LlmClient>, config: RetrievalConfig) -> Self {
        Self {
            llm,
            config,
            state: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Reload and re-embed every document. Returns the number of chunks.
    pub async fn rebuild(&self) -> anyhow::Result<usize> {
        let mut guard = self.state.write().await;
        let state = self.build().await?;
        let count = state.chunks.len();
        *guard = Some(Arc::new(state));
        Ok(count)
    }

    /// Number of indexed chunks, or `None` if the index was never built.
    pub async fn chunk_count(&self) -> Option<usize> {
        self.state.read().await.as_ref().map(|s| s.chunks.len())
    }

    /// Most similar chunks for `query`, best first.
    pub async fn search(&self, query: &str) -> anyhow::Result<Vec<ScoredChunk>> {
        let state = self.ensure_built().await?;
        if state.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self
            .llm
            .embed(&self.config.embed_model, &[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedding service returned no vector for query"))?;

        let mut scored: Vec<ScoredChunk> = state
            .chunks
            .iter()
            .zip(&state.vectors)
            .map(|(chunk, vector)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(&query_vector, vector),
            })
            .collect();

        // Rank, cap, then drop weak matches
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.config.top_k);
        scored.retain(|hit| hit.score >= self.config.min_score);

        tracing::debug!("Policy search returned {} hits for: {}", scored.len(), query);
        Ok(scored)
    }

    async fn ensure_built(&self) -> anyhow::Result<Arc<IndexState>> {
        if let Some(state) = self.state.read().await.as_ref() {
            return Ok(Arc::clone(state));
        }

        let mut guard = self.state.write().await;
        if let Some(state) = guard.as_ref() {
            return Ok(Arc::clone(state));
        }
        let state = Arc::new(self.build().await?);
        *guard = Some(Arc::clone(&state));
        Ok(state)
    }

    async fn build(&self) -> anyhow::Result<IndexState> {
        // Load documents off the runtime threads
        let dir = self.config.policy_dir.clone();
        let documents = tokio::task::spawn_blocking(move || load_documents(&dir))
            .await
            .context("document loader panicked")??;

        let chunks: Vec<Chunk> = documents
            .into_iter()
            .flat_map(|(source, text)| {
                split_text(&text, self.config.chunk_size, self.config.chunk_overlap)
                    .into_iter()
                    .map(move |text| Chunk {
                        source: source.clone(),
                        text,
                    })
            })
            .collect();

        // Embed in batches
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self.llm.embed(&self.config.embed_model, &texts).await?;
            vectors.extend(embedded);
        }

        tracing::info!(
            "Indexed {} policy chunks from {}",
            chunks.len(),
            self.config.policy_dir.display()
        );
        Ok(IndexState { chunks, vectors })
    }
}

/// Read every supported policy file under `dir`, sorted by relative path.
pub fn load_documents(dir: &Path) -> anyhow::Result<Vec<(String, String)>> {
    if !dir.is_dir() {
        anyhow::bail!("policy directory not found: {}", dir.display());
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| INDEXED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if !entry.file_type().is_file() || !supported {
            continue;
        }

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Skipping unreadable policy file {}: {}", path.display(), e);
                continue;
            }
        };
        let source = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        documents.push((source, text));
    }

    documents.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(documents)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
