//! SessionManager - actor that owns the checkpoint store
//!
//! Processes commands via channels for thread-safe access to persistent
//! state. The store itself is synchronous; single ownership inside the actor
//! serializes all checkpoint I/O without locks.

use sessionstore::{CheckpointStore, CheckpointSummary, SqliteStore, StoreError};
use std::path::Path;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::domain::Session;

use super::messages::{SessionCommand, SessionError, SessionResponse};

/// Handle to send commands to the SessionManager actor
#[derive(Clone)]
pub struct SessionManager {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionManager {
    /// Spawn a SessionManager actor over any checkpoint store
    pub fn spawn(store: impl CheckpointStore + 'static) -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(store, rx));
        info!("SessionManager spawned");
        Self { tx }
    }

    /// Spawn over a SQLite store rooted at the given directory
    pub fn spawn_sqlite(store_dir: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_dir = %store_dir.as_ref().display(), "SessionManager::spawn_sqlite: called");
        let store = SqliteStore::open(store_dir)?;
        Ok(Self::spawn(store))
    }

    /// Persist a brand-new session (version must be 0)
    pub async fn create(&self, session: Session) -> SessionResponse<()> {
        debug!(id = %session.id, "SessionManager::create: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Create {
                session,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::ChannelError)?;
        reply_rx.await.map_err(|_| SessionError::ChannelError)?
    }

    /// Fetch the latest checkpoint for a session id
    pub async fn get(&self, id: &str) -> SessionResponse<Option<Session>> {
        debug!(%id, "SessionManager::get: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Get {
                id: id.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::ChannelError)?;
        reply_rx.await.map_err(|_| SessionError::ChannelError)?
    }

    /// Commit a turn's updated session; returns the new version
    pub async fn put(&self, session: Session) -> SessionResponse<u64> {
        debug!(id = %session.id, version = session.version, "SessionManager::put: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Put {
                session,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::ChannelError)?;
        reply_rx.await.map_err(|_| SessionError::ChannelError)?
    }

    /// List stored sessions
    pub async fn list(&self) -> SessionResponse<Vec<CheckpointSummary>> {
        debug!("SessionManager::list: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::List { reply: reply_tx })
            .await
            .map_err(|_| SessionError::ChannelError)?;
        reply_rx.await.map_err(|_| SessionError::ChannelError)?
    }
}

fn map_store_error(err: StoreError) -> SessionError {
    match err {
        StoreError::VersionConflict { id, expected, actual } => SessionError::Conflict { id, expected, actual },
        other => SessionError::StoreError(other.to_string()),
    }
}

fn write_session(store: &mut impl CheckpointStore, mut session: Session) -> SessionResponse<u64> {
    let expected = session.version;
    session.version = expected + 1;

    if !session.outputs_consistent() {
        // A later phase's output without the earlier ones means the routing
        // logic is broken upstream; persist anyway but make it visible
        warn!(id = %session.id, "write_session: phase outputs violate ordering invariant");
    }

    let payload = serde_json::to_string(&session).map_err(|e| SessionError::StoreError(e.to_string()))?;
    store
        .put_latest(&session.id, expected, &payload)
        .map_err(map_store_error)
}

async fn actor_loop(mut store: impl CheckpointStore, mut rx: mpsc::Receiver<SessionCommand>) {
    debug!("actor_loop: started");
    while let Some(command) = rx.recv().await {
        match command {
            SessionCommand::Create { session, reply } => {
                let result = write_session(&mut store, session).map(|_| ());
                let _ = reply.send(result);
            }
            SessionCommand::Get { id, reply } => {
                let result = match store.get_latest(&id) {
                    Ok(Some(checkpoint)) => {
                        // Persistence boundary validation happens here: the
                        // phase/stage fields decode with documented
                        // fallbacks, whole-payload corruption is a store
                        // error
                        match serde_json::from_str::<Session>(&checkpoint.payload) {
                            Ok(mut session) => {
                                session.version = checkpoint.version;
                                Ok(Some(session))
                            }
                            Err(e) => {
                                warn!(%id, error = %e, "actor_loop: corrupt checkpoint payload");
                                Err(SessionError::StoreError(format!("corrupt checkpoint for '{}': {}", id, e)))
                            }
                        }
                    }
                    Ok(None) => Ok(None),
                    Err(e) => Err(map_store_error(e)),
                };
                let _ = reply.send(result);
            }
            SessionCommand::Put { session, reply } => {
                let result = write_session(&mut store, session);
                let _ = reply.send(result);
            }
            SessionCommand::List { reply } => {
                let result = store.list().map_err(map_store_error);
                let _ = reply.send(result);
            }
        }
    }
    debug!("actor_loop: channel closed, shutting down");
}
