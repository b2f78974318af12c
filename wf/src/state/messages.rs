//! Session manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::Session;
use sessionstore::CheckpointSummary;

/// Errors from session state operations.
///
/// `NotFound` is the one error class that crosses the core's boundary to the
/// caller; it signals caller misuse (an unknown session id), not transient
/// infrastructure noise.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No such session: {0}")]
    NotFound(String),

    #[error("Session '{id}' was modified concurrently (expected version {expected}, found {actual})")]
    Conflict { id: String, expected: u64, actual: u64 },

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from session state operations
pub type SessionResponse<T> = Result<T, SessionError>;

/// Commands sent to the SessionManager actor
#[derive(Debug)]
pub enum SessionCommand {
    Create {
        session: Session,
        reply: oneshot::Sender<SessionResponse<()>>,
    },
    Get {
        id: String,
        reply: oneshot::Sender<SessionResponse<Option<Session>>>,
    },
    Put {
        session: Session,
        reply: oneshot::Sender<SessionResponse<u64>>,
    },
    List {
        reply: oneshot::Sender<SessionResponse<Vec<CheckpointSummary>>>,
    },
}
