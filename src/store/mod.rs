//! Session persistence: best-effort state maps and durable, append-only event logs.
//!
//! Two backends implement [`SessionStore`]:
//!
//! | Backend       | Use                                            |
//! |---------------|------------------------------------------------|
//! | `MemoryStore` | tests and `--ephemeral` runs                   |
//! | `SqliteStore` | default; `.bookish/sessions.db`                |
//!
//! Events are never updated or deleted once appended. State maps may be
//! replaced wholesale or dropped (`clear_state`); the orchestrator recovers
//! the phase from the event log when that happens.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::session::{Event, SessionState, SessionSummary};

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Register a new session with its initial state. Re-creating an existing
    /// session leaves it untouched.
    async fn create_session(&self, session_id: &str, state: &SessionState) -> StoreResult<()>;

    async fn session_exists(&self, session_id: &str) -> StoreResult<bool>;

    /// Current state map; an empty map when the state was lost or never written.
    async fn get_state(&self, session_id: &str) -> StoreResult<SessionState>;

    async fn put_state(&self, session_id: &str, state: &SessionState) -> StoreResult<()>;

    /// Drop the mutable state of a session, keeping its event log.
    async fn clear_state(&self, session_id: &str) -> StoreResult<()>;

    /// Append events in order, assigning their sequence numbers. Returns the
    /// events as stored.
    async fn append_events(&self, session_id: &str, events: Vec<Event>) -> StoreResult<Vec<Event>>;

    /// The full log, oldest first.
    async fn read_events(&self, session_id: &str) -> StoreResult<Vec<Event>>;

    async fn list_sessions(&self) -> StoreResult<Vec<SessionSummary>>;
}
