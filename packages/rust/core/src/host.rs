//! Host-facing pipeline object with startup/shutdown lifecycle.
//!
//! A chat host calls [`Pipeline::on_startup`] once, then
//! [`Pipeline::pipe`] per user message, then [`Pipeline::on_shutdown`].

use std::sync::Arc;

use tracing::{debug, info, instrument};

use controlqa_search::SearchClient;
use controlqa_shared::{AppConfig, ChatMessage, Result, read_api_key};
use controlqa_storage::Storage;
use controlqa_synthesis::CompletionClient;

use crate::pipeline::{Orchestrator, PipeProgress, SilentProgress};

/// Secrets resolved from the environment at startup.
#[derive(Clone)]
pub struct ApiKeys {
    pub search: String,
    pub completion: String,
}

impl ApiKeys {
    /// Read both keys from the env vars named in `config`.
    pub fn from_env(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            search: read_api_key(&config.search.api_key_env)?,
            completion: read_api_key(&config.completion.api_key_env)?,
        })
    }
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("search", &"<redacted>")
            .field("completion", &"<redacted>")
            .finish()
    }
}

/// A started pipeline: configured clients plus the open control store.
pub struct Pipeline {
    orchestrator: Orchestrator,
    store: Arc<Storage>,
}

impl Pipeline {
    /// Validate `config`, read API keys, build clients, and open the store.
    pub async fn on_startup(config: &AppConfig) -> Result<Self> {
        let keys = ApiKeys::from_env(config)?;
        Self::connect(config, keys).await
    }

    /// Startup with explicitly supplied keys.
    #[instrument(skip_all, fields(index = %config.search.index_name, deployment = %config.completion.deployment))]
    pub async fn connect(config: &AppConfig, keys: ApiKeys) -> Result<Self> {
        config.validate()?;

        let search = SearchClient::new(&config.search, keys.search)?;
        let completion = CompletionClient::new(&config.completion, keys.completion)?;

        let db_path = config.store.resolved_path()?;
        let store = Arc::new(Storage::open(&db_path).await?);

        info!(
            search = %search.url(),
            completion = %completion.url(),
            store = %db_path.display(),
            audit = config.store.audit,
            "pipeline started"
        );

        let mut orchestrator =
            Orchestrator::new(store.clone(), Arc::new(search), Arc::new(completion));
        if config.store.audit {
            orchestrator = orchestrator.with_audit(store.clone());
        }

        Ok(Self {
            orchestrator,
            store,
        })
    }

    /// Answer one chat message.
    ///
    /// `model_id`, `messages`, and `body` come from the chat host and are
    /// only logged; the answer depends on `user_message` alone.
    pub async fn pipe(
        &self,
        user_message: &str,
        model_id: &str,
        messages: &[ChatMessage],
        body: &serde_json::Value,
    ) -> String {
        self.pipe_with_progress(user_message, model_id, messages, body, &SilentProgress)
            .await
    }

    /// [`Pipeline::pipe`] with a progress reporter.
    pub async fn pipe_with_progress(
        &self,
        user_message: &str,
        model_id: &str,
        messages: &[ChatMessage],
        body: &serde_json::Value,
        progress: &dyn PipeProgress,
    ) -> String {
        debug!(
            model_id,
            history = messages.len(),
            body_keys = body.as_object().map_or(0, |o| o.len()),
            "pipe invoked"
        );
        self.orchestrator.pipe(user_message, progress).await
    }

    /// Release clients and the store connection.
    pub async fn on_shutdown(self) {
        let Self {
            orchestrator,
            store,
        } = self;
        // The orchestrator holds store clones; drop it first.
        drop(orchestrator);
        drop(store);
        info!("pipeline shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use controlqa_shared::ControlDocument;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(search_uri: &str, completion_uri: &str, audit: bool) -> AppConfig {
        let mut config = AppConfig::default();
        config.search.endpoint = search_uri.to_string();
        config.search.index_name = "controls-index".into();
        config.completion.endpoint = completion_uri.to_string();
        config.completion.deployment = "gpt-4o".into();
        config.store.path = std::env::temp_dir()
            .join(format!("cqa_host_test_{}.db", Uuid::now_v7()))
            .to_string_lossy()
            .into_owned();
        config.store.audit = audit;
        config
    }

    fn keys() -> ApiKeys {
        ApiKeys {
            search: "search-key".into(),
            completion: "completion-key".into(),
        }
    }

    async fn mount_services(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/indexes/controls-index/docs/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    { "@search.score": 3.2, "title": "mfa-policy.pdf", "chunk": "MFA is required for all users." }
                ]
            })))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/openai/deployments/gpt-4o/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [ { "message": { "role": "assistant", "content": "Contoso: yes, MFA is enforced." } } ]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn startup_fails_without_api_keys() {
        let mut config = AppConfig::default();
        config.search.api_key_env = format!("CONTROLQA_TEST_UNSET_{}", Uuid::now_v7().simple());

        let err = Pipeline::on_startup(&config).await.err().expect("startup should fail");
        assert_eq!(err.component(), "configuration");
        assert!(err.to_string().contains("CONTROLQA_TEST_UNSET_"));
    }

    #[tokio::test]
    async fn startup_rejects_bad_endpoint() {
        let mut config = test_config("http://localhost", "http://localhost", false);
        config.search.endpoint = "not a url".into();

        let err = Pipeline::connect(&config, keys()).await.err().expect("connect should fail");
        assert_eq!(err.component(), "configuration");
    }

    #[tokio::test]
    async fn end_to_end_control_question() {
        let server = MockServer::start().await;
        mount_services(&server).await;

        let config = test_config(&server.uri(), &server.uri(), true);
        let pipeline = Pipeline::connect(&config, keys()).await.expect("connect");
        pipeline
            .store
            .upsert_control(&ControlDocument {
                family: "IA".into(),
                control_id: "2".into(),
                name: "Identification and Authentication".into(),
                generated_questions: "Is MFA enforced?".into(),
            })
            .await
            .unwrap();

        let text = pipeline
            .pipe(
                "Check Family: IA ControlID: 2",
                "controlqa-pipeline",
                &[ChatMessage {
                    role: "user".into(),
                    content: "Check Family: IA ControlID: 2".into(),
                }],
                &json!({ "stream": false }),
            )
            .await;

        assert_eq!(
            text,
            "**Family: IA | ControlID: 2**\n\n\
             **Q: Is MFA enforced?**\n\
             A: Contoso: yes, MFA is enforced.\n\
             Sources used:\n\
             - mfa-policy.pdf (Score: 3.20)"
        );

        let audit = pipeline.store.list_audit(10).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].content, text);

        pipeline.on_shutdown().await;
    }

    #[tokio::test]
    async fn audit_disabled_writes_nothing() {
        let server = MockServer::start().await;
        mount_services(&server).await;

        let config = test_config(&server.uri(), &server.uri(), false);
        let pipeline = Pipeline::connect(&config, keys()).await.expect("connect");

        let text = pipeline
            .pipe("What is MFA?", "controlqa-pipeline", &[], &json!({}))
            .await;
        assert!(text.ends_with("---\nSources used:\n- mfa-policy.pdf (Score: 3.20)"));
        assert!(pipeline.store.list_audit(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upstream_outage_yields_failure_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let config = test_config(&server.uri(), &server.uri(), true);
        let pipeline = Pipeline::connect(&config, keys()).await.expect("connect");

        let text = pipeline
            .pipe("What is MFA?", "controlqa-pipeline", &[], &json!({}))
            .await;
        assert!(text.starts_with("Sorry, this request could not be completed"));
        assert!(text.contains("search service"));
        assert!(pipeline.store.list_audit(10).await.unwrap().is_empty());
    }
}
