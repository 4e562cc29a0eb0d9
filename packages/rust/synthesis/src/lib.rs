//! Answer synthesis over an Azure OpenAI chat-completions deployment.
//!
//! One request per call: a system message carrying retrieved context and the
//! task framing, a user message carrying the question. Non-streaming, fixed
//! sampling parameters, no retries.

use std::time::Duration;

use controlqa_shared::{CompletionConfig, ControlQaError, Result, parse_endpoint};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use url::Url;

/// Service label used in errors and user-facing failure messages.
pub const SERVICE: &str = "completion service";

/// User-Agent string for completion requests.
const USER_AGENT: &str = concat!("ControlQA/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: [RequestMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

// ---------------------------------------------------------------------------
// Sampling parameters
// ---------------------------------------------------------------------------

/// Generation budget applied to every request.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SamplingParams {
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

/// The fixed budget: not configurable.
const SAMPLING: SamplingParams = SamplingParams {
    max_tokens: 800,
    temperature: 0.7,
    top_p: 0.95,
};

// ---------------------------------------------------------------------------
// CompletionClient
// ---------------------------------------------------------------------------

/// Client for one chat-completions deployment.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: Client,
    url: Url,
    api_key: String,
}

impl CompletionClient {
    /// Build a client for the deployment described by `config`.
    pub fn new(config: &CompletionConfig, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = parse_endpoint("completion.endpoint", &config.endpoint)?;
        let mut url = Url::parse(&format!(
            "{}/openai/deployments/{}/chat/completions",
            endpoint.as_str().trim_end_matches('/'),
            config.deployment
        ))
        .map_err(|e| ControlQaError::config(format!("invalid completion URL: {e}")))?;
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
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request one completion and return its text verbatim.
    #[instrument(skip_all, fields(system_len = system_prompt.len(), user_len = user_content.len()))]
    pub async fn synthesize(&self, system_prompt: &str, user_content: &str) -> Result<String> {
        let request = ChatRequest {
            messages: [
                RequestMessage {
                    role: "system",
                    content: system_prompt,
                },
                RequestMessage {
                    role: "user",
                    content: user_content,
                },
            ],
            max_tokens: SAMPLING.max_tokens,
            temperature: SAMPLING.temperature,
            top_p: SAMPLING.top_p,
            stream: false,
        };

        let response = self
            .http
            .post(self.url.clone())
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ControlQaError::upstream_transport(SERVICE, &e, e.is_timeout()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ControlQaError::upstream_status(SERVICE, status, &detail));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            ControlQaError::upstream(SERVICE, format!("malformed completion response: {e}"))
        })?;

        if let Some(usage) = &parsed.usage {
            info!(
                tokens_in = usage.prompt_tokens,
                tokens_out = usage.completion_tokens,
                "completion received"
            );
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ControlQaError::upstream(SERVICE, "completion returned no content"))
    }
}
