//! The per-session query state machine.
//!
//! A `SessionController` owns everything one user touches: the document
//! store, the pending question and the last result. It is driven only by
//! [`Trigger`]s and reports back through [`TriggerOutcome`], its
//! [`SessionView`] and events on the [`EventBus`]. No trigger can fail the
//! session itself; every error settles into state the user can see.

use chrono::{DateTime, Utc};
use itzai_core::document::{DocumentSlot, DocumentSource};
use itzai_core::error::{CycleError, LoadError};
use itzai_core::event::{DomainEvent, EventBus};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::assembler::PromptAssembler;
use crate::engine::QueryEngine;
use crate::extractor::DocumentExtractor;
use crate::registry::SessionId;
use crate::store::{DocumentStore, SlotStatus};

/// A user action delivered to a session.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Replace the pending question text.
    EditQuestion(String),
    /// Run one query cycle with the pending question.
    Analyze,
    /// Load a document into a slot.
    LoadDocument {
        slot: DocumentSlot,
        source: DocumentSource,
    },
    /// Turn inclusion of the treatment protocol on or off.
    SetIncludeSupplementary(bool),
}

/// Where the session is inside a query cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    /// Question captured and buffer cleared.
    Reading,
    /// Checking that a clinical history is loaded.
    Validating,
    Assembling,
    Querying,
    /// Result stored; the next trigger returns to `Idle`.
    Settled,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Reading => "reading",
            Self::Validating => "validating",
            Self::Assembling => "assembling",
            Self::Querying => "querying",
            Self::Settled => "settled",
        };
        f.write_str(s)
    }
}

/// Either an answer or the reason there is none.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Answer(String),
    Failed(CycleError),
}

/// The terminal value of a query cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub outcome: QueryOutcome,
    pub settled_at: DateTime<Utc>,
}

impl QueryResult {
    fn new(outcome: QueryOutcome) -> Self {
        Self {
            outcome,
            settled_at: Utc::now(),
        }
    }

    pub fn answer(&self) -> Option<&str> {
        match &self.outcome {
            QueryOutcome::Answer(text) => Some(text),
            QueryOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&CycleError> {
        match &self.outcome {
            QueryOutcome::Answer(_) => None,
            QueryOutcome::Failed(err) => Some(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, QueryOutcome::Answer(_))
    }

    /// The answer text, or the cycle failure as a crate-level error.
    pub fn into_answer(self) -> itzai_core::Result<String> {
        match self.outcome {
            QueryOutcome::Answer(text) => Ok(text),
            QueryOutcome::Failed(err) => Err(err.into()),
        }
    }
}

/// The user's in-progress question.
#[derive(Debug, Clone, Default)]
pub struct PendingQuestionBuffer {
    text: String,
}

impl PendingQuestionBuffer {
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Return the current text and leave the buffer empty.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// What handling a single trigger produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    QuestionEdited,
    Settled(QueryResult),
    Loaded { slot: DocumentSlot, chars: usize },
    LoadFailed { slot: DocumentSlot, error: LoadError },
    ToggleSet(bool),
}

/// Everything a rendering layer needs to draw a session.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub session_id: SessionId,
    pub phase: CyclePhase,
    pub primary: SlotStatus,
    pub supplementary: SlotStatus,
    /// Most recent load failure per slot, cleared by a successful load.
    pub primary_error: Option<LoadError>,
    pub supplementary_error: Option<LoadError>,
    pub include_supplementary: bool,
    pub pending_question: String,
    pub last_question: Option<String>,
    pub last_result: Option<QueryResult>,
}

/// Drives one session through load, toggle and query cycles.
pub struct SessionController {
    id: SessionId,
    store: DocumentStore,
    assembler: PromptAssembler,
    engine: Arc<QueryEngine>,
    buffer: PendingQuestionBuffer,
    last_question: Option<String>,
    last_result: Option<QueryResult>,
    phase: CyclePhase,
    load_errors: HashMap<DocumentSlot, LoadError>,
    event_bus: Arc<EventBus>,
}

impl SessionController {
    pub fn new(extractor: Arc<dyn DocumentExtractor>, engine: Arc<QueryEngine>) -> Self {
        Self {
            id: SessionId::new(),
            store: DocumentStore::new(extractor),
            assembler: PromptAssembler::default(),
            engine,
            buffer: PendingQuestionBuffer::default(),
            last_question: None,
            last_result: None,
            phase: CyclePhase::Idle,
            load_errors: HashMap::new(),
            event_bus: Arc::new(EventBus::default()),
        }
    }

    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_id(mut self, id: SessionId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn last_result(&self) -> Option<&QueryResult> {
        self.last_result.as_ref()
    }

    /// Handle one trigger to completion.
    pub async fn handle(&mut self, trigger: Trigger) -> TriggerOutcome {
        if self.phase == CyclePhase::Settled {
            self.phase = CyclePhase::Idle;
        }

        match trigger {
            Trigger::EditQuestion(text) => {
                self.buffer.set(text);
                TriggerOutcome::QuestionEdited
            }
            Trigger::Analyze => TriggerOutcome::Settled(self.run_cycle().await),
            Trigger::LoadDocument { slot, source } => self.load_document(slot, &source).await,
            Trigger::SetIncludeSupplementary(enabled) => {
                self.store.set_include_supplementary(enabled);
                debug!(session = %self.id, enabled, "Protocol inclusion toggled");
                self.event_bus.publish(DomainEvent::SupplementaryToggled {
                    session_id: self.id.to_string(),
                    enabled,
                    timestamp: Utc::now(),
                });
                TriggerOutcome::ToggleSet(enabled)
            }
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id.clone(),
            phase: self.phase,
            primary: self.store.status(DocumentSlot::Primary),
            supplementary: self.store.status(DocumentSlot::Supplementary),
            primary_error: self.load_errors.get(&DocumentSlot::Primary).cloned(),
            supplementary_error: self.load_errors.get(&DocumentSlot::Supplementary).cloned(),
            include_supplementary: self.store.include_supplementary(),
            pending_question: self.buffer.text().to_string(),
            last_question: self.last_question.clone(),
            last_result: self.last_result.clone(),
        }
    }

    async fn load_document(
        &mut self,
        slot: DocumentSlot,
        source: &DocumentSource,
    ) -> TriggerOutcome {
        let loaded = self
            .store
            .load(slot, source)
            .await
            .map(|doc| (doc.source_descriptor.clone(), doc.char_count()));

        match loaded {
            Ok((source, chars)) => {
                self.load_errors.remove(&slot);
                self.event_bus.publish(DomainEvent::DocumentLoaded {
                    session_id: self.id.to_string(),
                    slot,
                    source,
                    chars,
                    timestamp: Utc::now(),
                });
                TriggerOutcome::Loaded { slot, chars }
            }
            Err(error) => {
                self.load_errors.insert(slot, error.clone());
                self.event_bus.publish(DomainEvent::DocumentLoadFailed {
                    session_id: self.id.to_string(),
                    slot,
                    reason: error.to_string(),
                    timestamp: Utc::now(),
                });
                TriggerOutcome::LoadFailed { slot, error }
            }
        }
    }

    async fn run_cycle(&mut self) -> QueryResult {
        let start = Instant::now();

        // The buffer is cleared before anything can fail.
        self.phase = CyclePhase::Reading;
        let question = self.buffer.take();

        self.phase = CyclePhase::Validating;
        if !self.store.has_primary() {
            // Without a history the question is dropped, not recorded.
            warn!(session = %self.id, "Query without a clinical history");
            self.last_question = None;
            return self.settle(QueryOutcome::Failed(CycleError::MissingPrimaryDocument), 0, start);
        }
        self.last_question = Some(question.clone());

        self.phase = CyclePhase::Assembling;
        let view = self.store.snapshot();
        let prompt = match self.assembler.assemble(&view, &question) {
            Ok(prompt) => prompt,
            Err(e) => {
                return self.settle(QueryOutcome::Failed(CycleError::AssemblyFailed(e)), 0, start);
            }
        };
        let documents_used = prompt.request.documents_used.len();

        self.phase = CyclePhase::Querying;
        let outcome = match self.engine.submit(&prompt.text).await {
            Ok(answer) => QueryOutcome::Answer(answer),
            Err(e) => QueryOutcome::Failed(CycleError::QueryFailed(e)),
        };

        self.settle(outcome, documents_used, start)
    }

    fn settle(
        &mut self,
        outcome: QueryOutcome,
        documents_used: usize,
        start: Instant,
    ) -> QueryResult {
        let result = QueryResult::new(outcome);
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result.outcome {
            QueryOutcome::Answer(_) => {
                info!(session = %self.id, documents_used, duration_ms, "Query cycle settled")
            }
            QueryOutcome::Failed(err) => {
                warn!(session = %self.id, error = %err, duration_ms, "Query cycle failed")
            }
        }

        self.event_bus.publish(DomainEvent::QuerySettled {
            session_id: self.id.to_string(),
            success: result.is_success(),
            documents_used,
            duration_ms,
            timestamp: result.settled_at,
        });

        self.phase = CyclePhase::Settled;
        self.last_result = Some(result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, StubExtractor};
    use itzai_core::error::{ExtractError, ProviderError};

    fn controller(extractor: StubExtractor, provider: Arc<ScriptedProvider>) -> SessionController {
        let engine = Arc::new(QueryEngine::new(provider, "mock-model"));
        SessionController::new(Arc::new(extractor), engine)
    }

    fn history_extractor() -> StubExtractor {
        StubExtractor::new()
            .with_text("HC.pdf", "Patient X, dx: migraine.")
            .with_text("protocol.pdf", "Protocol: triptans first line.")
    }

    async fn load(
        session: &mut SessionController,
        slot: DocumentSlot,
        path: &str,
    ) -> TriggerOutcome {
        session
            .handle(Trigger::LoadDocument {
                slot,
                source: DocumentSource::path(path),
            })
            .await
    }

    async fn ask(session: &mut SessionController, question: &str) -> QueryResult {
        session.handle(Trigger::EditQuestion(question.into())).await;
        match session.handle(Trigger::Analyze).await {
            TriggerOutcome::Settled(result) => result,
            other => panic!("expected Settled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_cycle_settles_with_answer() {
        let provider = Arc::new(ScriptedProvider::answer("Diagnosis: migraine."));
        let mut session = controller(history_extractor(), provider.clone());

        let outcome = load(&mut session, DocumentSlot::Primary, "HC.pdf").await;
        assert_eq!(
            outcome,
            TriggerOutcome::Loaded {
                slot: DocumentSlot::Primary,
                chars: 24
            }
        );

        let result = ask(&mut session, "What is the diagnosis?").await;
        assert_eq!(result.answer(), Some("Diagnosis: migraine."));
        assert_eq!(session.phase(), CyclePhase::Settled);
        assert_eq!(session.view().last_question.as_deref(), Some("What is the diagnosis?"));
        assert_eq!(provider.call_count(), 1);
        assert!(provider.prompts()[0].contains("Patient X, dx: migraine."));
    }

    #[tokio::test]
    async fn missing_primary_never_calls_provider() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let mut session = controller(history_extractor(), provider.clone());
        load(&mut session, DocumentSlot::Supplementary, "protocol.pdf").await;
        session.handle(Trigger::SetIncludeSupplementary(true)).await;

        let result = ask(&mut session, "anything").await;
        assert_eq!(result.error(), Some(&CycleError::MissingPrimaryDocument));
        assert_eq!(provider.call_count(), 0);

        let err = result.into_answer().unwrap_err();
        assert!(matches!(err, itzai_core::Error::Cycle(CycleError::MissingPrimaryDocument)));
    }

    #[tokio::test]
    async fn buffer_cleared_even_when_cycle_fails() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let mut session = controller(StubExtractor::new(), provider);

        let result = ask(&mut session, "Summarize").await;
        assert!(!result.is_success());

        let view = session.view();
        assert!(view.pending_question.is_empty());
        assert_eq!(view.last_question, None);
    }

    #[tokio::test]
    async fn provider_failure_settles_query_failed() {
        let provider = Arc::new(ScriptedProvider::failing(ProviderError::Network(
            "connection reset".into(),
        )));
        let mut session = controller(history_extractor(), provider);
        load(&mut session, DocumentSlot::Primary, "HC.pdf").await;

        let result = ask(&mut session, "q").await;
        match result.error() {
            Some(CycleError::QueryFailed(e)) => assert!(e.cause.contains("connection reset")),
            other => panic!("expected QueryFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_cycle_does_not_block_next_one() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::Timeout("slow".into())),
            Ok("Recovered answer".into()),
        ]));
        let mut session = controller(history_extractor(), provider.clone());
        load(&mut session, DocumentSlot::Primary, "HC.pdf").await;

        assert!(!ask(&mut session, "first").await.is_success());
        let second = ask(&mut session, "second").await;
        assert_eq!(second.answer(), Some("Recovered answer"));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn next_trigger_returns_settled_session_to_idle() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let mut session = controller(StubExtractor::new(), provider);

        ask(&mut session, "q").await;
        assert_eq!(session.phase(), CyclePhase::Settled);

        session.handle(Trigger::EditQuestion("next".into())).await;
        assert_eq!(session.phase(), CyclePhase::Idle);
    }

    #[tokio::test]
    async fn empty_question_proceeds_through_validation() {
        let provider = Arc::new(ScriptedProvider::answer("Please ask a question."));
        let mut session = controller(history_extractor(), provider.clone());
        load(&mut session, DocumentSlot::Primary, "HC.pdf").await;

        let TriggerOutcome::Settled(result) = session.handle(Trigger::Analyze).await else {
            panic!("expected Settled");
        };
        assert!(result.is_success());
        assert_eq!(provider.call_count(), 1);
        assert!(session.view().pending_question.is_empty());
    }

    #[tokio::test]
    async fn load_failure_is_recorded_and_keeps_document() {
        let extractor = history_extractor().with_error(
            "broken.pdf",
            ExtractError::ParseError("unexpected EOF".into()),
        );
        let mut session = controller(extractor, Arc::new(ScriptedProvider::new(vec![])));
        load(&mut session, DocumentSlot::Primary, "HC.pdf").await;

        let outcome = load(&mut session, DocumentSlot::Primary, "broken.pdf").await;
        assert!(matches!(
            outcome,
            TriggerOutcome::LoadFailed {
                error: LoadError::ParseError(_),
                ..
            }
        ));

        let view = session.view();
        assert_eq!(view.primary.source.as_deref(), Some("HC.pdf"));
        assert!(view.primary_error.is_some());

        load(&mut session, DocumentSlot::Primary, "HC.pdf").await;
        assert!(session.view().primary_error.is_none());
    }

    #[tokio::test]
    async fn toggle_controls_protocol_in_prompt() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("a".into()), Ok("b".into())]));
        let mut session = controller(history_extractor(), provider.clone());
        load(&mut session, DocumentSlot::Primary, "HC.pdf").await;
        load(&mut session, DocumentSlot::Supplementary, "protocol.pdf").await;

        ask(&mut session, "without").await;
        session.handle(Trigger::SetIncludeSupplementary(true)).await;
        ask(&mut session, "with").await;

        let prompts = provider.prompts();
        assert!(!prompts[0].contains("triptans"));
        assert!(prompts[1].contains("triptans"));
        assert!(session.view().include_supplementary);
    }

    #[tokio::test]
    async fn events_published_for_load_toggle_and_settle() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let provider = Arc::new(ScriptedProvider::answer("ok"));
        let mut session = controller(history_extractor(), provider).with_event_bus(bus);

        load(&mut session, DocumentSlot::Primary, "HC.pdf").await;
        load(&mut session, DocumentSlot::Supplementary, "missing.pdf").await;
        session.handle(Trigger::SetIncludeSupplementary(true)).await;
        ask(&mut session, "q").await;

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(*events[0], DomainEvent::DocumentLoaded { chars: 24, .. }));
        assert!(matches!(*events[1], DomainEvent::DocumentLoadFailed { .. }));
        assert!(matches!(*events[2], DomainEvent::SupplementaryToggled { enabled: true, .. }));
        assert!(matches!(
            *events[3],
            DomainEvent::QuerySettled {
                success: true,
                documents_used: 1,
                ..
            }
        ));
    }

    #[test]
    fn buffer_take_empties() {
        let mut buffer = PendingQuestionBuffer::default();
        buffer.set("question");
        assert_eq!(buffer.take(), "question");
        assert!(buffer.is_empty());
        assert_eq!(buffer.take(), "");
    }
}
