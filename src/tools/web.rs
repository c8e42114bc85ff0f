//! Web search tool backed by the Tavily search API.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{required_str, Tool, ToolError};
use crate::config::SearchConfig;

const MAX_RESULTS: u32 = 5;
/// Upper bound on the serialized context handed back to the model.
const MAX_CONTEXT_CHARS: usize = 16_000;

/// Search the web and return source snippets as context.
pub struct WebSearch {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl WebSearch {
    pub fn new(config: &SearchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn search(&self, query: &str) -> anyhow::Result<Vec<SearchResult>> {
        let request = SearchRequest {
            query,
            search_depth: "basic",
            max_results: MAX_RESULTS,
            include_answer: false,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("HTTP error: {} {}", status, body.trim()));
        }

        let parsed: SearchResponse = response.json().await.context("Malformed search response")?;
        Ok(parsed.results)
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: u32,
    include_answer: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Serialize results as a JSON array of `{url, content}`, keeping whole
/// entries until the size budget is spent.
fn build_context(results: &[SearchResult]) -> String {
    let mut entries = Vec::new();
    let mut used = 2;
    for result in results {
        let entry = json!({"url": result.url, "content": result.content});
        let len = entry.to_string().len() + 2;
        if used + len > MAX_CONTEXT_CHARS && !entries.is_empty() {
            break;
        }
        used += len;
        entries.push(entry);
    }
    Value::Array(entries).to_string()
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information about the given query. Returns relevant sources with their URLs and content."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let query = required_str(self.name(), args, "query")?.trim();
        if query.is_empty() {
            return Err(ToolError::invalid(self.name(), "query must not be empty"));
        }

        let results = self
            .search(query)
            .await
            .map_err(|e| ToolError::failed("searching the web", format!("{:#}", e)))?;

        if results.is_empty() {
            Ok(format!("No results found for: {}", query))
        } else {
            Ok(build_context(&results))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_stub;
    use axum::{http::StatusCode, routing::post, Json, Router};

    fn tool(base_url: String) -> WebSearch {
        WebSearch::new(&SearchConfig {
            api_key: "tvly-test".to_string(),
            base_url,
        })
        .unwrap()
    }

    fn args(query: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("query".to_string(), json!(query));
        map
    }

    #[tokio::test]
    async fn returns_url_and_content_context() {
        let router = Router::new().route(
            "/search",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["query"], "rust async");
                assert_eq!(body["max_results"], 5);
                Json(json!({
                    "query": "rust async",
                    "results": [
                        {"title": "Tokio", "url": "https://tokio.rs", "content": "An async runtime", "score": 0.9},
                        {"title": "Book", "url": "https://rust-lang.github.io/async-book", "content": "Async in Rust", "score": 0.8}
                    ]
                }))
            }),
        );
        let base = spawn_stub(router).await;

        let output = tool(base).execute(&args("rust async")).await.unwrap();
        let parsed: Value = serde_json::from_str(&output).expect("context is JSON");
        assert_eq!(
            parsed,
            json!([
                {"url": "https://tokio.rs", "content": "An async runtime"},
                {"url": "https://rust-lang.github.io/async-book", "content": "Async in Rust"}
            ])
        );
    }

    #[tokio::test]
    async fn empty_results_are_reported() {
        let router = Router::new().route(
            "/search",
            post(|| async { Json(json!({"results": []})) }),
        );
        let base = spawn_stub(router).await;

        let output = tool(base).execute(&args("zxqv")).await.unwrap();
        assert_eq!(output, "No results found for: zxqv");
    }

    #[tokio::test]
    async fn provider_errors_become_error_strings() {
        let router = Router::new().route(
            "/search",
            post(|| async { (StatusCode::UNAUTHORIZED, "invalid api key") }),
        );
        let base = spawn_stub(router).await;

        let err = tool(base).execute(&args("anything")).await.unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Error searching the web: HTTP error: 401"), "{}", message);
    }

    #[test]
    fn context_respects_size_budget() {
        let big = "x".repeat(MAX_CONTEXT_CHARS / 2);
        let results: Vec<SearchResult> = (0..5)
            .map(|i| SearchResult {
                url: format!("https://example.com/{}", i),
                content: big.clone(),
            })
            .collect();
        let context = build_context(&results);
        let parsed: Vec<Value> = serde_json::from_str(&context).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(context.len() <= MAX_CONTEXT_CHARS);
    }
}
