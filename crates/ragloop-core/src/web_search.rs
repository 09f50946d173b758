// Web search adapter (Tavily) and search-result formatting
//
// TavilySearch implements the WebSearch port over the Tavily REST API.
// The formatting helpers turn hits into the text the agents hand to the LLM.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::traits::{SearchHit, WebSearch};

const DEFAULT_API_URL: &str = "https://api.tavily.com/search";
const DEFAULT_MAX_RESULTS: usize = 3;

/// Tavily web search client
#[derive(Clone)]
pub struct TavilySearch {
    client: Client,
    api_key: String,
    api_url: String,
    max_results: usize,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_API_URL)
    }

    /// Create a client against a custom endpoint
    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Build a client only when a non-blank key is available
    pub fn from_key(api_key: Option<&str>) -> Option<Self> {
        api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(Self::new)
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results: self.max_results,
        };

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::web_search(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentError::web_search(format!(
                "Tavily API error ({}): {}",
                status, error_text
            )));
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| AgentError::web_search(format!("Invalid response: {}", e)))?;

        tracing::debug!(query, hits = body.results.len(), "Web search completed");
        Ok(body.results)
    }
}

impl std::fmt::Debug for TavilySearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilySearch")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("max_results", &self.max_results)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

// ============================================================================
// Formatting
// ============================================================================

/// Format hits as evidence blocks: `[title]` line followed by the content.
/// Hits without a title are labelled "Untitled".
pub fn format_hits_as_evidence(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            let title = if hit.title.trim().is_empty() {
                "Untitled"
            } else {
                hit.title.as_str()
            };
            format!("[{}]\n{}", title, hit.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Format hits as a numbered reference list shown to the user and the LLM
pub fn format_search_results(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let mut out = String::from("Search results:\n");
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. {}\n{}\nSource: {}\n",
            i + 1,
            hit.title,
            hit.content,
            hit.url
        ));
    }
    out
}

/// Attach formatted search results to a user prompt
pub fn augment_prompt(prompt: &str, formatted_results: &str) -> String {
    format!(
        "{}\n\n{}\n\nPlease answer with reference to the search results above.",
        prompt, formatted_results
    )
}
