//! Coach service - the inbound turn entry point
//!
//! Owns the per-session locking discipline and the checkpoint round-trip:
//! load latest -> run the turn engine -> commit with a version check. One
//! logical turn per session runs to completion before the next is accepted;
//! turns for different sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::config::MethodologyConfig;
use crate::domain::Session;
use crate::engine::TurnEngine;
use crate::llm::LlmClient;
use crate::methodology::{Phase, Stage};
use crate::phases::entry_greeting;
use crate::state::{SessionError, SessionManager};

/// What the caller gets back from one processed turn
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub session_id: String,
    pub reply: String,
    pub phase: Phase,
    pub stage: Stage,
    pub phase_complete: bool,
    pub concluded: bool,
}

/// Explicitly constructed coaching front door; the store and model client
/// are injected, never read from ambient global state
pub struct CoachService {
    manager: SessionManager,
    engine: TurnEngine,
    locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl CoachService {
    pub fn new(manager: SessionManager, llm: Arc<dyn LlmClient>, config: MethodologyConfig) -> Self {
        Self {
            manager,
            engine: TurnEngine::new(llm, config),
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn session_lock(&self, id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(id.to_string()).or_default().clone()
    }

    /// Create a fresh session at WHY/welcome with the opening greeting
    pub async fn start_session(&self, user_context: HashMap<String, String>) -> Result<Session, SessionError> {
        let mut session = Session::new();
        session.user_context = user_context;
        session.push_assistant(entry_greeting(Phase::Why));

        info!(id = %session.id, "start_session: created");
        self.manager.create(session.clone()).await?;

        // Return the stored copy so the caller holds the right version
        self.manager
            .get(&session.id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session.id.clone()))
    }

    /// Process one user turn for an existing session.
    ///
    /// A missing session id is the caller's error and propagates as
    /// `NotFound`; everything else the turn can hit is absorbed into the
    /// reply.
    pub async fn process_turn(&self, session_id: &str, message: &str) -> Result<TurnReply, SessionError> {
        debug!(%session_id, "process_turn: called");

        // Single writer per session: hold the lock across load -> turn ->
        // commit so a concurrent turn cannot produce a lost update
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session = self
            .manager
            .get(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let processed = self.engine.process_turn(session, message).await;
        let session = processed.session;

        self.manager.put(session.clone()).await?;

        Ok(TurnReply {
            session_id: session.id,
            reply: processed.reply,
            phase: session.phase,
            stage: session.stage,
            phase_complete: session.phase_complete,
            concluded: session.concluded,
        })
    }

    /// Load a session snapshot (read-only)
    pub async fn get_session(&self, session_id: &str) -> Result<Session, SessionError> {
        self.manager
            .get(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }
}
