//! Session registry.
//!
//! Each user gets an isolated `SessionController` behind its own mutex.
//! The map lock is held only long enough to find the session, so a long
//! query cycle in one session never delays another.

use itzai_core::error::{Error, Result};
use itzai_core::event::EventBus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::assembler::PromptAssembler;
use crate::engine::QueryEngine;
use crate::extractor::DocumentExtractor;
use crate::session::{SessionController, SessionView, Trigger, TriggerOutcome};

/// Opaque session identifier (UUID v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

type SharedSession = Arc<Mutex<SessionController>>;

/// All live sessions, sharing one extractor, engine and event bus.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SharedSession>>,
    extractor: Arc<dyn DocumentExtractor>,
    engine: Arc<QueryEngine>,
    assembler: PromptAssembler,
    event_bus: Arc<EventBus>,
}

impl SessionRegistry {
    pub fn new(extractor: Arc<dyn DocumentExtractor>, engine: Arc<QueryEngine>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            extractor,
            engine,
            assembler: PromptAssembler::default(),
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

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    /// Create a fresh session and return its id.
    pub async fn open(&self) -> SessionId {
        let id = SessionId::new();
        let controller = SessionController::new(self.extractor.clone(), self.engine.clone())
            .with_assembler(self.assembler.clone())
            .with_event_bus(self.event_bus.clone())
            .with_id(id.clone());

        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(controller)));
        info!(session = %id, "Session opened");
        id
    }

    pub async fn get(&self, id: &SessionId) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Deliver `trigger` to session `id` and wait for it to be handled.
    ///
    /// Triggers for the same session are serialized; different sessions run
    /// concurrently.
    pub async fn dispatch(&self, id: &SessionId, trigger: Trigger) -> Result<TriggerOutcome> {
        let session = self.session(id).await?;
        let mut controller = session.lock().await;
        Ok(controller.handle(trigger).await)
    }

    pub async fn view(&self, id: &SessionId) -> Result<SessionView> {
        let session = self.session(id).await?;
        let controller = session.lock().await;
        Ok(controller.view())
    }

    /// Drop a session and everything it holds. Returns whether it existed.
    pub async fn close(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(session = %id, "Session closed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn session(&self, id: &SessionId) -> Result<SharedSession> {
        self.get(id)
            .await
            .ok_or_else(|| Error::UnknownSession(id.to_string()))
    }
}
