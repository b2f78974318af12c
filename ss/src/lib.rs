//! SessionStore - versioned checkpoint storage for conversational sessions
//!
//! Stores one latest snapshot per session id with an optimistic version
//! check, so two concurrent writers for the same session cannot produce a
//! lost update. Payloads are opaque JSON text; callers own serialization.
//!
//! # Architecture
//!
//! ```text
//! {store-dir}/
//! └── sessions.db          # SQLite, one row per session id
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sessionstore::{CheckpointStore, SqliteStore};
//!
//! let store = SqliteStore::open(".wayfinder")?;
//! store.put_latest("sess-1", 0, r#"{"phase":"why"}"#)?;
//! let cp = store.get_latest("sess-1")?.expect("just written");
//! assert_eq!(cp.version, 1);
//! ```

mod store;

pub use store::{Checkpoint, CheckpointStore, CheckpointSummary, MemoryStore, SqliteStore, StoreError};

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
