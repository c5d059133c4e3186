//! # Web Research
//!
//! SearXNG-backed search feeding the topic generator. Search is best effort:
//! an unreachable backend yields no results, never an error.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public SearXNG instances tried after the configured one
const PUBLIC_ENDPOINTS: [&str; 3] = [
    "https://searx.be",
    "https://search.sapti.me",
    "https://searx.tiekoetter.com",
];

const LOCAL_ENDPOINTS: [&str; 2] = ["http://localhost:8888", "http://127.0.0.1:8888"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Clone)]
pub struct WebResearch {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl WebResearch {
    /// `searxng_url` (or `SEARXNG_URL`) is tried first, then public and local
    /// instances.
    pub fn new(searxng_url: Option<&str>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("inkflow/0.1")
            .build()?;

        let mut endpoints = Vec::new();
        let configured = searxng_url
            .map(str::to_string)
            .or_else(|| std::env::var("SEARXNG_URL").ok());
        if let Some(url) = configured {
            endpoints.push(search_endpoint(&url));
        }
        endpoints.extend(PUBLIC_ENDPOINTS.iter().map(|u| search_endpoint(u)));
        endpoints.extend(LOCAL_ENDPOINTS.iter().map(|u| search_endpoint(u)));

        Ok(Self { client, endpoints })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// First endpoint that answers wins
    pub async fn search(&self, query: &str, max_results: usize) -> Vec<SearchHit> {
        for endpoint in &self.endpoints {
            let url = format!("{}?q={}&format=json", endpoint, urlencoding::encode(query));
            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(endpoint = %endpoint, error = %e, "search endpoint unreachable");
                    continue;
                }
            };
            if let Ok(json) = response.json::<serde_json::Value>().await {
                if let Some(hits) = parse_results(&json, max_results) {
                    return hits;
                }
            }
        }
        tracing::warn!(query, "no search backend answered");
        Vec::new()
    }

    /// Run every query and fold the hits into one source digest for the
    /// topic prompt
    pub async fn gather(&self, queries: &[String], per_query: usize) -> String {
        let mut digest = String::new();
        for query in queries {
            let hits = self.search(query, per_query).await;
            digest.push_str(&render_digest(query, &hits));
        }
        digest
    }
}

fn search_endpoint(base: &str) -> String {
    format!("{}/search", base.trim_end_matches('/'))
}

/// SearXNG JSON `results` array -> hits
fn parse_results(json: &serde_json::Value, max_results: usize) -> Option<Vec<SearchHit>> {
    let results = json.get("results")?.as_array()?;
    let field = |r: &serde_json::Value, key: &str| {
        r.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    Some(
        results
            .iter()
            .take(max_results)
            .map(|r| SearchHit {
                title: field(r, "title"),
                url: field(r, "url"),
                snippet: field(r, "content"),
            })
            .collect(),
    )
}

fn render_digest(query: &str, hits: &[SearchHit]) -> String {
    let mut out = format!("Search: {}\n", query);
    if hits.is_empty() {
        out.push_str("Search failed for this query\n");
    }
    for hit in hits {
        out.push_str(&format!(
            "Title: {}\nBody: {}\nURL: {}\n",
            hit.title, hit.snippet, hit.url
        ));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_configured_endpoint_comes_first() {
        let research = WebResearch::new(Some("http://searx.local/")).unwrap();
        assert_eq!(research.endpoints()[0], "http://searx.local/search");
        assert!(research
            .endpoints()
            .iter()
            .any(|e| e == "http://localhost:8888/search"));
    }

    #[test]
    fn test_parse_results_limits_and_maps() {
        let json = json!({
            "results": [
                {"title": "A", "url": "https://a", "content": "about a"},
                {"title": "B", "url": "https://b"},
                {"title": "C", "url": "https://c", "content": "about c"}
            ]
        });
        let hits = parse_results(&json, 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].snippet, "about a");
        assert_eq!(hits[1].snippet, "");

        assert!(parse_results(&json!({"error": "rate limited"}), 5).is_none());
    }

    #[test]
    fn test_digest_marks_empty_queries() {
        let digest = render_digest("rust news", &[]);
        assert!(digest.starts_with("Search: rust news\n"));
        assert!(digest.contains("Search failed"));
    }
}
