//! Semantic search adapter.
//!
//! Queries an Azure AI Search index over its REST API with semantic ranking
//! and turns the ranked hits into a prompt context blob plus a citation list.

mod format;

use std::time::Duration;

use controlqa_shared::{ControlQaError, Result, SearchConfig, SearchHit, parse_endpoint};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument};
use url::Url;

use format::{collapse_whitespace, format_context, format_sources};

/// Service label used in errors and user-facing failure messages.
pub const SERVICE: &str = "search service";

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("ControlQA/", env!("CARGO_PKG_VERSION"));

/// Hits requested per query.
const TOP_HITS: u32 = 5;

/// Response field carrying the relevance score of a hit.
const SCORE_FIELD: &str = "@search.score";

// ---------------------------------------------------------------------------
// SearchContext
// ---------------------------------------------------------------------------

/// Retrieved context for one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchContext {
    /// Hits rendered as `FILE:` / `CONTENT:` blocks; empty when nothing matched.
    pub context: String,
    /// One `- {title} (Score: {score})` line per hit; empty when nothing matched.
    pub source_list: String,
    /// The hits in the order the service returned them.
    pub hits: Vec<SearchHit>,
}

impl SearchContext {
    /// Build both renderings from the same ordered hits.
    pub fn from_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            context: format_context(&hits),
            source_list: format_sources(&hits),
            hits,
        }
    }

    /// True when the query produced no usable context.
    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<Map<String, Value>>,
}

// ---------------------------------------------------------------------------
// SearchClient
// ---------------------------------------------------------------------------

/// Client for one search index. Cheap to share across tasks.
#[derive(Debug, Clone)]
pub struct SearchClient {
    http: Client,
    url: Url,
    api_key: String,
    semantic_configuration: String,
    title_field: String,
    content_field: String,
}

impl SearchClient {
    /// Build a client for the index described by `config`.
    pub fn new(config: &SearchConfig, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = parse_endpoint("search.endpoint", &config.endpoint)?;
        let mut url = Url::parse(&format!(
            "{}/indexes/{}/docs/search",
            endpoint.as_str().trim_end_matches('/'),
            config.index_name
        ))
        .map_err(|e| ControlQaError::config(format!("invalid search index URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("api-version", &config.api_version);

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ControlQaError::upstream(SERVICE, format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            url,
            api_key: api_key.into(),
            semantic_configuration: config.semantic_configuration.clone(),
            title_field: config.title_field.clone(),
            content_field: config.content_field.clone(),
        })
    }

    /// The fully-qualified search URL requests are sent to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Run a semantic query and return the rendered context for its hits.
    ///
    /// Zero hits is not an error: both renderings come back empty.
    #[instrument(skip_all, fields(query_len = query_text.len()))]
    pub async fn search(&self, query_text: &str) -> Result<SearchContext> {
        let body = json!({
            "search": query_text,
            "queryType": "semantic",
            "semanticConfiguration": self.semantic_configuration,
            "select": format!("{},{}", self.title_field, self.content_field),
            "top": TOP_HITS,
        });

        let response = self
            .http
            .post(self.url.clone())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ControlQaError::upstream_transport(SERVICE, &e, e.is_timeout()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ControlQaError::upstream_status(SERVICE, status, &detail));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            ControlQaError::upstream(SERVICE, format!("malformed search response: {e}"))
        })?;

        let hits = parsed
            .value
            .iter()
            .map(|doc| self.to_hit(doc))
            .collect::<Vec<_>>();

        info!(hits = hits.len(), "search complete");
        Ok(SearchContext::from_hits(hits))
    }

    fn to_hit(&self, doc: &Map<String, Value>) -> SearchHit {
        let field = |name: &str| doc.get(name).and_then(Value::as_str).unwrap_or_default();
        if !doc.contains_key(&self.content_field) {
            debug!(field = %self.content_field, "hit has no content field");
        }
        SearchHit {
            title: field(&self.title_field).to_string(),
            content: collapse_whitespace(field(&self.content_field)),
            score: doc.get(SCORE_FIELD).and_then(Value::as_f64).unwrap_or(0.0),
        }
    }
}
