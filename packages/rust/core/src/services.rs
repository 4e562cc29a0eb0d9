//! Collaborator interfaces used by the orchestrator, and their production
//! implementations over the store, search, and completion clients.
//!
//! The orchestrator only sees these traits, so tests and alternative hosts
//! can swap any of them without touching the workflow.

use async_trait::async_trait;
use tracing::{debug, info};

use controlqa_search::{SearchClient, SearchContext};
use controlqa_shared::{AuditRecord, ControlIdentifier, ControlRecord, Result};
use controlqa_storage::Storage;
use controlqa_synthesis::CompletionClient;

/// Looks up the control record for a resolved identifier.
#[async_trait]
pub trait ControlResolver: Send + Sync {
    /// `Ok(None)` means no such control; `Err` means the store could not be asked.
    async fn resolve(&self, id: &ControlIdentifier) -> Result<Option<ControlRecord>>;
}

/// Retrieves context for a query from the search index.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, query_text: &str) -> Result<SearchContext>;
}

/// Generates answer text from a system prompt and user content.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, system_prompt: &str, user_content: &str) -> Result<String>;
}

/// Persists the final response of an invocation.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Production implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl ControlResolver for Storage {
    async fn resolve(&self, id: &ControlIdentifier) -> Result<Option<ControlRecord>> {
        let doc = self.get_control(&id.family, &id.control_id).await?;
        match &doc {
            Some(doc) => info!(
                control = %id,
                name = %doc.name,
                "control resolved"
            ),
            None => info!(control = %id, "no control found"),
        }
        Ok(doc.as_ref().map(ControlRecord::from))
    }
}

#[async_trait]
impl AuditSink for Storage {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        self.insert_audit(record).await?;
        debug!(id = %record.id, "audit record written");
        Ok(())
    }
}

#[async_trait]
impl SearchService for SearchClient {
    async fn search(&self, query_text: &str) -> Result<SearchContext> {
        SearchClient::search(self, query_text).await
    }
}

#[async_trait]
impl Synthesizer for CompletionClient {
    async fn synthesize(&self, system_prompt: &str, user_content: &str) -> Result<String> {
        CompletionClient::synthesize(self, system_prompt, user_content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use controlqa_shared::ControlDocument;
    use uuid::Uuid;

    async fn seeded_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("cqa_core_test_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.expect("open test db");
        storage
            .upsert_control(&ControlDocument {
                family: "AC".into(),
                control_id: "2".into(),
                name: "Access Control".into(),
                generated_questions: "Q1?\n\nQ2?\n  \nQ3?".into(),
            })
            .await
            .expect("seed");
        storage
    }

    #[tokio::test]
    async fn storage_resolves_records_with_split_questions() {
        let storage = seeded_storage().await;
        let resolver: &dyn ControlResolver = &storage;

        let record = resolver
            .resolve(&ControlIdentifier::new("AC", "2"))
            .await
            .expect("resolve")
            .expect("found");
        assert_eq!(record.name, "Access Control");
        assert_eq!(record.generated_questions, vec!["Q1?", "Q2?", "Q3?"]);

        let again = resolver
            .resolve(&ControlIdentifier::new("AC", "2"))
            .await
            .unwrap();
        assert_eq!(again, Some(record));
    }

    #[tokio::test]
    async fn storage_reports_missing_control_as_none() {
        let storage = seeded_storage().await;
        let missing = storage
            .resolve(&ControlIdentifier::new("ZZ", "99"))
            .await
            .expect("resolve");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn storage_audit_sink_persists() {
        let storage = seeded_storage().await;
        let record = AuditRecord::new("final answer");
        AuditSink::record(&storage, &record).await.expect("record");

        let stored = storage.list_audit(5).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "final answer");
    }
}
