use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::{SessionStore, StoreResult};
use crate::errors::StoreError;
use crate::session::{Event, EventKind, SessionState, SessionSummary};

/// SQLite-backed store.
///
/// Wraps the connection behind `Arc<Mutex>` and runs every query on tokio's
/// blocking pool via `spawn_blocking`, so synchronous SQLite I/O never ties
/// up async worker threads. The `events` table rejects UPDATE and DELETE
/// through triggers.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database at the given path and run migrations.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = Self::from_connection(conn)?;
        tracing::debug!(path = %path.display(), "session database opened");
        Ok(store)
    }

    /// In-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS session_state (
                session_id TEXT PRIMARY KEY REFERENCES sessions(id),
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS events (
                session_id TEXT NOT NULL REFERENCES sessions(id),
                seq INTEGER NOT NULL,
                id TEXT NOT NULL,
                author TEXT NOT NULL,
                kind TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                PRIMARY KEY (session_id, seq)
            );

            CREATE TRIGGER IF NOT EXISTS events_no_update
            BEFORE UPDATE ON events
            BEGIN
                SELECT RAISE(ABORT, 'events are append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS events_no_delete
            BEFORE DELETE ON events
            BEGIN
                SELECT RAISE(ABORT, 'events are append-only');
            END;
            ",
        )?;
        Ok(())
    }

    /// Run a closure against the connection on a blocking thread.
    async fn call<F, R>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Connection) -> StoreResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::TaskJoin(e.to_string()))?
    }
}

fn session_exists(conn: &Connection, session_id: &str) -> StoreResult<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT id FROM sessions WHERE id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn require_session(conn: &Connection, session_id: &str) -> StoreResult<()> {
    if session_exists(conn, session_id)? {
        Ok(())
    } else {
        Err(StoreError::SessionNotFound {
            id: session_id.to_string(),
        })
    }
}

fn write_state(conn: &Connection, session_id: &str, state: &SessionState) -> StoreResult<()> {
    let json = serde_json::to_string(state)?;
    conn.execute(
        "INSERT INTO session_state (session_id, state, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(session_id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
        params![session_id, json, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn read_state(conn: &Connection, session_id: &str) -> StoreResult<SessionState> {
    let json: Option<String> = conn
        .query_row(
            "SELECT state FROM session_state WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()?;
    match json {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(SessionState::new()),
    }
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Database(format!("Invalid timestamp '{}': {}", raw, e)))
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create_session(&self, session_id: &str, state: &SessionState) -> StoreResult<()> {
        let id = session_id.to_string();
        let state = state.clone();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO sessions (id, created_at) VALUES (?1, ?2)",
                params![id, Utc::now().to_rfc3339()],
            )?;
            if inserted > 0 {
                write_state(&tx, &id, &state)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn session_exists(&self, session_id: &str) -> StoreResult<bool> {
        let id = session_id.to_string();
        self.call(move |conn| session_exists(conn, &id)).await
    }

    async fn get_state(&self, session_id: &str) -> StoreResult<SessionState> {
        let id = session_id.to_string();
        self.call(move |conn| {
            require_session(conn, &id)?;
            read_state(conn, &id)
        })
        .await
    }

    async fn put_state(&self, session_id: &str, state: &SessionState) -> StoreResult<()> {
        let id = session_id.to_string();
        let state = state.clone();
        self.call(move |conn| {
            require_session(conn, &id)?;
            write_state(conn, &id, &state)
        })
        .await
    }

    async fn clear_state(&self, session_id: &str) -> StoreResult<()> {
        let id = session_id.to_string();
        self.call(move |conn| {
            require_session(conn, &id)?;
            conn.execute(
                "DELETE FROM session_state WHERE session_id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
    }

    async fn append_events(&self, session_id: &str, events: Vec<Event>) -> StoreResult<Vec<Event>> {
        let id = session_id.to_string();
        self.call(move |conn| {
            require_session(conn, &id)?;
            let tx = conn.transaction()?;
            let last: u64 = tx.query_row(
                "SELECT COALESCE(MAX(seq), 0) FROM events WHERE session_id = ?1",
                params![id],
                |row| row.get::<_, i64>(0),
            )? as u64;

            let mut stored = Vec::with_capacity(events.len());
            for (offset, mut event) in events.into_iter().enumerate() {
                event.seq = last + offset as u64 + 1;
                event.session_id = id.clone();
                let kind = serde_json::to_string(&event.kind)?;
                tx.execute(
                    "INSERT INTO events (session_id, seq, id, author, kind, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        id,
                        event.seq as i64,
                        event.id.to_string(),
                        event.author,
                        kind,
                        event.timestamp.to_rfc3339()
                    ],
                )?;
                stored.push(event);
            }
            tx.commit()?;
            Ok(stored)
        })
        .await
    }

    async fn read_events(&self, session_id: &str) -> StoreResult<Vec<Event>> {
        let id = session_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, id, author, kind, timestamp FROM events
                 WHERE session_id = ?1 ORDER BY seq ASC",
            )?;
            let rows = stmt
                .query_map(params![id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(seq, event_id, author, kind, timestamp)| -> StoreResult<Event> {
                    let kind: EventKind = serde_json::from_str(&kind)?;
                    Ok(Event {
                        id: Uuid::parse_str(&event_id)
                            .map_err(|e| StoreError::Database(format!("Invalid event id: {}", e)))?,
                        session_id: id.clone(),
                        seq: seq as u64,
                        author,
                        kind,
                        timestamp: parse_timestamp(&timestamp)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn list_sessions(&self) -> StoreResult<Vec<SessionSummary>> {
        self.call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.created_at,
                        (SELECT COUNT(*) FROM events e WHERE e.session_id = s.id)
                 FROM sessions s ORDER BY s.created_at ASC, s.id ASC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, created_at, count)| -> StoreResult<SessionSummary> {
                    let state = read_state(conn, &id)?;
                    Ok(SessionSummary {
                        created_at: parse_timestamp(&created_at)?,
                        event_count: count as u64,
                        current_phase: state.current_phase(),
                        id,
                    })
                })
                .collect()
        })
        .await
    }
}
