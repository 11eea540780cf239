//! Web search backend: SerpAPI when a key is configured, DuckDuckGo HTML
//! otherwise.
//!
//! Successful results are cached per exact query and outgoing requests are
//! spaced by a minimum delay. When nothing useful comes back the client
//! answers with topic-specific guidance instead of an error.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

const SERPAPI_URL: &str = "https://serpapi.com/search";
const DDG_URL: &str = "https://html.duckduckgo.com/html/";
const MAX_RESULTS: usize = 5;
pub const FALLBACK_CITATION: &str = "Annet - HR Research Assistant";

/// Answer plus the links it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchAnswer {
    pub answer: String,
    pub citations: Vec<String>,
}

/// Search backend settings.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub serpapi_key: Option<String>,
    pub serpapi_url: String,
    pub ddg_url: String,
    /// Minimum spacing between two outgoing searches
    pub rate_limit: Duration,
    pub timeout: Duration,
}

impl SearchConfig {
    pub fn new(serpapi_key: Option<String>) -> Self {
        Self {
            serpapi_key,
            serpapi_url: SERPAPI_URL.to_string(),
            ddg_url: DDG_URL.to_string(),
            rate_limit: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Which engine answers searches, for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SearchStatus {
    pub search_engine: String,
    pub api_key_status: String,
    pub cached_queries: usize,
    pub setup_instructions: Vec<String>,
}

pub struct WebSearchClient {
    http: reqwest::Client,
    config: SearchConfig,
    cache: Mutex<HashMap<String, SearchAnswer>>,
    last_search: Mutex<Option<Instant>>,
    whitespace: Regex,
}

#[derive(Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

impl WebSearchClient {
    pub fn new(config: SearchConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; Annet/1.0)")
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            config,
            cache: Mutex::new(HashMap::new()),
            last_search: Mutex::new(None),
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Search the web. Never fails: problems turn into guidance answers.
    pub async fn search(&self, query: &str) -> SearchAnswer {
        // Check cache
        if let Some(hit) = self.cache.lock().await.get(query) {
            tracing::debug!("Search cache hit: {}", query);
            return hit.clone();
        }

        self.wait_for_rate_limit().await;

        // Query the configured engine
        let result = if self.config.serpapi_key.is_some() {
            self.serpapi_search(query).await
        } else {
            self.ddg_search(query).await
        };

        // Only real results are cached
        match result {
            Ok(Some(answer)) if !answer.answer.is_empty() => {
                self.cache
                    .lock()
                    .await
                    .insert(query.to_string(), answer.clone());
                answer
            }
            Ok(_) => {
                tracing::info!("Web search found nothing for: {}", query);
                fallback_answer(query)
            }
            Err(e) => {
                tracing::warn!("Web search failed: {:#}", e);
                fallback_answer(query)
            }
        }
    }

    /// Drop all cached results. Returns how many were removed.
    pub async fn clear_cache(&self) -> usize {
        let mut cache = self.cache.lock().await;
        let removed = cache.len();
        cache.clear();
        tracing::info!("Web search cache cleared ({} entries)", removed);
        removed
    }

    pub async fn status(&self) -> SearchStatus {
        let configured = self.config.serpapi_key.is_some();
        SearchStatus {
            search_engine: if configured {
                "SerpAPI (Google Search)".to_string()
            } else {
                "DuckDuckGo HTML".to_string()
            },
            api_key_status: if configured { "configured" } else { "not configured" }.to_string(),
            cached_queries: self.cache.lock().await.len(),
            setup_instructions: vec![
                "Set SERPAPI_KEY in the environment".to_string(),
                "Get your API key from https://serpapi.com/".to_string(),
                "Free tier includes 100 searches per month".to_string(),
            ],
        }
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_search.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.config.rate_limit {
                tokio::time::sleep(self.config.rate_limit - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn serpapi_search(&self, query: &str) -> anyhow::Result<Option<SearchAnswer>> {
        let key = self.config.serpapi_key.as_deref().unwrap_or_default();
        let response = self
            .http
            .get(&self.config.serpapi_url)
            .query(&[
                ("q", query),
                ("api_key", key),
                ("engine", "google"),
                ("num", "10"),
                ("gl", "us"),
                ("hl", "en"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let data: SerpApiResponse = response.json().await?;
        let mut snippets = Vec::new();
        let mut citations = Vec::new();
        for result in data.organic_results.into_iter().take(MAX_RESULTS) {
            if let Some(snippet) = result.snippet.filter(|s| !s.is_empty()) {
                snippets.push(snippet);
            }
            if let Some(link) = result.link.filter(|l| !l.is_empty()) {
                citations.push(link);
            }
        }

        if snippets.is_empty() {
            return Ok(None);
        }
        if citations.is_empty() {
            citations.push("SerpAPI".to_string());
        }

        Ok(Some(SearchAnswer {
            answer: self.collapse_whitespace(&snippets.join(" ")),
            citations,
        }))
    }

    async fn ddg_search(&self, query: &str) -> anyhow::Result<Option<SearchAnswer>> {
        let url = format!("{}?q={}", self.config.ddg_url, urlencoding::encode(query));
        let html = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let results = extract_ddg_results(&html);
        if results.is_empty() {
            return Ok(None);
        }

        let answer = results
            .iter()
            .map(|r| r.snippet.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(Some(SearchAnswer {
            answer: self.collapse_whitespace(&answer),
            citations: results.into_iter().filter_map(|r| r.url).collect(),
        }))
    }

    fn collapse_whitespace(&self, text: &str) -> String {
        self.whitespace.replace_all(text, " ").trim().to_string()
    }
}

struct DdgResult {
    snippet: String,
    url: Option<String>,
}

/// Extract search results from DuckDuckGo HTML.
fn extract_ddg_results(html: &str) -> Vec<DdgResult> {
    let mut results = Vec::new();

    for chunk in html.split("class=\"result__body\"").skip(1).take(MAX_RESULTS) {
        let field = |class: &str| {
            chunk
                .split(class)
                .nth(1)
                .and_then(|s| s.split('>').nth(1))
                .and_then(|s| s.split('<').next())
                .map(|s| html_decode(s.trim()))
                .filter(|s| !s.is_empty())
        };

        let Some(snippet) = field("class=\"result__snippet\"") else {
            continue;
        };
        let url = field("class=\"result__url\"").map(|u| {
            if u.starts_with("http") {
                u
            } else {
                format!("https://{}", u)
            }
        });
        results.push(DdgResult { snippet, url });
    }

    results
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
}

/// Guidance returned when search produced nothing usable.
pub fn fallback_answer(query: &str) -> SearchAnswer {
    let lower = query.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let mentions = |terms: &[&str]| {
        terms.iter().any(|t| {
            if t.contains(' ') {
                lower.contains(t)
            } else {
                words.contains(t)
            }
        })
    };

    let tips = if mentions(&["government", "policy", "tn govt", "tamil nadu"]) {
        format!(
            "I couldn't find specific recent information about '{}' through web search. \
             For the most up-to-date information about government policies, I recommend:\n\n\
             • Checking the official government website for the region\n\
             • Visiting the relevant labour or IT department portal\n\
             • Contacting local government offices directly\n\
             • Checking recent coverage from established news outlets",
            query
        )
    } else if mentions(&[
        "ai",
        "artificial intelligence",
        "hardware",
        "technology",
        "tech",
        "latest",
        "news",
    ]) {
        format!(
            "I couldn't find specific recent information about '{}' through web search. \
             For the most up-to-date information about technology developments, I recommend:\n\n\
             • Checking technology news sites\n\
             • Visiting official vendor websites\n\
             • Following industry blogs and newsletters\n\
             • Checking recent conference announcements",
            query
        )
    } else {
        format!(
            "I couldn't find specific information about '{}' through web search. \
             To get better results, try:\n\n\
             • Using more specific keywords\n\
             • Adding date ranges (e.g., '2024', 'recent')\n\
             • Checking official websites directly\n\
             • Consulting specialized industry publications",
            query
        )
    };

    SearchAnswer {
        answer: format!("{}\n\nWould you like me to help you rephrase your search query?", tips),
        citations: vec![FALLBACK_CITATION.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, key: Option<&str>) -> WebSearchClient {
        let mut config = SearchConfig::new(key.map(str::to_string));
        config.serpapi_url = format!("{}/search", server.uri());
        config.ddg_url = format!("{}/html/", server.uri());
        config.rate_limit = Duration::from_millis(0);
        WebSearchClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn serpapi_results_are_combined_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "remote work law"))
            .and(query_param("engine", "google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic_results": [
                    { "snippet": "First   snippet.", "link": "https://a.example" },
                    { "snippet": "Second\nsnippet.", "link": "https://b.example" },
                    { "link": "https://c.example" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let search = client(&server, Some("key"));
        let first = search.search("remote work law").await;
        assert_eq!(first.answer, "First snippet. Second snippet.");
        assert_eq!(
            first.citations,
            ["https://a.example", "https://b.example", "https://c.example"]
        );

        let second = search.search("remote work law").await;
        assert_eq!(first, second);
        assert_eq!(search.status().await.cached_queries, 1);

        assert_eq!(search.clear_cache().await, 1);
        assert_eq!(search.status().await.cached_queries, 0);
    }

    #[tokio::test]
    async fn serpapi_without_links_cites_serpapi() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic_results": [{ "snippet": "Only text." }]
            })))
            .mount(&server)
            .await;

        let answer = client(&server, Some("key")).search("q").await;
        assert_eq!(answer.citations, ["SerpAPI"]);
    }

    #[tokio::test]
    async fn failures_fall_back_without_caching() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let search = client(&server, Some("key"));
        let answer = search.search("wellness programs").await;
        assert_eq!(answer.citations, [FALLBACK_CITATION]);
        assert!(answer.answer.contains("'wellness programs'"));
        assert_eq!(search.status().await.cached_queries, 0);
    }

    #[tokio::test]
    async fn duckduckgo_without_key() {
        let server = MockServer::start().await;
        let html = r#"
            <div class="result__body"><a class="result__a" href="x">Title</a>
            <a class="result__snippet">Wellness &amp; benefits</a>
            <a class="result__url">example.com/wellness</a></div>
            <div class="result__body"><a class="result__a">No snippet here</a></div>
        "#;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;

        let search = client(&server, None);
        let answer = search.search("wellness").await;
        assert_eq!(answer.answer, "Wellness & benefits");
        assert_eq!(answer.citations, ["https://example.com/wellness"]);
        assert_eq!(search.status().await.api_key_status, "not configured");
    }

    #[test]
    fn fallback_topics() {
        assert!(fallback_answer("Tamil Nadu remote policy")
            .answer
            .contains("government policies"));
        assert!(fallback_answer("latest AI hardware").answer.contains("technology"));
        assert!(fallback_answer("maintain a garden").answer.contains("more specific keywords"));
        // "ai" must be a word, not part of "maintain".
        assert!(!fallback_answer("maintain a garden").answer.contains("technology"));
    }

    #[tokio::test]
    async fn rate_limit_spaces_requests() {
        let mut config = SearchConfig::new(None);
        config.rate_limit = Duration::from_millis(50);
        let search = WebSearchClient::new(config).unwrap();

        let started = Instant::now();
        search.wait_for_rate_limit().await;
        search.wait_for_rate_limit().await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
