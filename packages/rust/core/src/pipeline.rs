//! Query resolution and multi-question answer aggregation.
//!
//! message → extract Family/ControlID →
//!   resolved: resolve control → per question: search → synthesize → aggregate
//!   otherwise: search the message → synthesize → answer with sources footer
//!
//! Any collaborator failure aborts the whole invocation: no partially
//! aggregated response is ever returned.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use controlqa_shared::{AnswerEntry, AuditRecord, ControlIdentifier, ControlRecord, Result};

use crate::extract::{self, Extraction};
use crate::prompt;
use crate::render;
use crate::services::{AuditSink, ControlResolver, SearchService, Synthesizer};

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Structured outcome of one invocation, before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeResponse {
    /// The control was found; one entry per question that had context.
    Answers {
        identifier: ControlIdentifier,
        entries: Vec<AnswerEntry>,
    },
    /// The message named a control the store does not have.
    NotFound(ControlIdentifier),
    /// No identifier: one answer to the message itself.
    FreeText { answer: String, source_list: String },
}

impl PipeResponse {
    /// Render the text returned to the chat user.
    pub fn render(&self) -> String {
        match self {
            Self::Answers {
                identifier,
                entries,
            } => render::render_answers(identifier, entries),
            Self::NotFound(identifier) => render::not_found_message(identifier),
            Self::FreeText {
                answer,
                source_list,
            } => render::render_free_text(answer, source_list),
        }
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait PipeProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each generated question is processed.
    fn question(&self, current: usize, total: usize, question: &str);
    /// Called once the invocation has produced its response.
    fn done(&self);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl PipeProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn question(&self, _current: usize, _total: usize, _question: &str) {}
    fn done(&self) {}
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Composes extraction, resolution, search, and synthesis into `pipe`.
///
/// Holds no mutable state; one instance serves concurrent invocations.
#[derive(Clone)]
pub struct Orchestrator {
    resolver: Arc<dyn ControlResolver>,
    search: Arc<dyn SearchService>,
    synthesizer: Arc<dyn Synthesizer>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl Orchestrator {
    pub fn new(
        resolver: Arc<dyn ControlResolver>,
        search: Arc<dyn SearchService>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            resolver,
            search,
            synthesizer,
            audit: None,
        }
    }

    /// Persist every successful response through `sink`.
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Run one invocation and always return text.
    ///
    /// Failures are logged and replaced by a fixed message naming the failing
    /// component. Successful responses are written to the audit sink, if any.
    pub async fn pipe(&self, user_message: &str, progress: &dyn PipeProgress) -> String {
        let start = Instant::now();
        let result = self.try_pipe(user_message, progress).await;
        progress.done();

        match result {
            Ok(response) => {
                let text = response.render();
                self.write_audit(&text).await;
                info!(elapsed_ms = start.elapsed().as_millis() as u64, "pipe complete");
                text
            }
            Err(e) => {
                error!(error = %e, component = e.component(), "pipe failed");
                render::failure_message(&e)
            }
        }
    }

    /// Run one invocation, surfacing the first collaborator failure.
    #[instrument(skip_all, fields(message_len = user_message.len()))]
    pub async fn try_pipe(
        &self,
        user_message: &str,
        progress: &dyn PipeProgress,
    ) -> Result<PipeResponse> {
        match extract::extract(user_message) {
            Extraction::Resolved(identifier) => {
                info!(control = %identifier, "control identifier found");
                progress.phase("Resolving control");
                match self.resolver.resolve(&identifier).await? {
                    Some(record) => {
                        let entries = self.answer_questions(&record, progress).await?;
                        Ok(PipeResponse::Answers {
                            identifier,
                            entries,
                        })
                    }
                    None => Ok(PipeResponse::NotFound(identifier)),
                }
            }
            Extraction::Partial { family, control_id } => {
                info!(
                    family = family.as_deref().unwrap_or("-"),
                    control_id = control_id.as_deref().unwrap_or("-"),
                    "incomplete control identifier, answering as free text"
                );
                self.answer_free_text(user_message, progress).await
            }
            Extraction::Unresolved => self.answer_free_text(user_message, progress).await,
        }
    }

    /// Answer each generated question in order; questions without context are skipped.
    async fn answer_questions(
        &self,
        record: &ControlRecord,
        progress: &dyn PipeProgress,
    ) -> Result<Vec<AnswerEntry>> {
        let questions: Vec<&str> = record
            .generated_questions
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .collect();
        let total = questions.len();
        let mut entries = Vec::with_capacity(total);

        for (i, question) in questions.into_iter().enumerate() {
            progress.question(i + 1, total, question);

            let query = format!("{} {question}", record.name);
            let retrieved = self.search.search(&query).await?;
            if retrieved.is_empty() {
                debug!(question, "no context retrieved, skipping question");
                continue;
            }

            let system_prompt = prompt::question_prompt(&record.name, &retrieved.context, question);
            let answer = self.synthesizer.synthesize(&system_prompt, question).await?;

            entries.push(AnswerEntry {
                question: question.to_string(),
                answer,
                source_list: retrieved.source_list,
            });
        }

        info!(
            answered = entries.len(),
            questions = total,
            control = %record.name,
            "questions processed"
        );
        Ok(entries)
    }

    async fn answer_free_text(
        &self,
        user_message: &str,
        progress: &dyn PipeProgress,
    ) -> Result<PipeResponse> {
        progress.phase("Searching documents");
        let retrieved = self.search.search(user_message).await?;

        progress.phase("Synthesizing answer");
        let system_prompt = prompt::generic_prompt(&retrieved.context);
        let answer = self
            .synthesizer
            .synthesize(&system_prompt, user_message)
            .await?;

        Ok(PipeResponse::FreeText {
            answer,
            source_list: retrieved.source_list,
        })
    }

    /// Record the rendered response exactly as returned, header and footers included.
    async fn write_audit(&self, text: &str) {
        let Some(sink) = &self.audit else {
            return;
        };
        let record = AuditRecord::new(text);
        if let Err(e) = sink.record(&record).await {
            warn!(id = %record.id, error = %e, "failed to write audit record");
        }
    }
}
