//! Session state management
//!
//! An actor owns the checkpoint store; everything else talks to it through
//! the [`SessionManager`] handle.

mod manager;
mod messages;

pub use manager::SessionManager;
pub use messages::{SessionCommand, SessionError, SessionResponse};
