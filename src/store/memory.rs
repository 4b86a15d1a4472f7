use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{SessionStore, StoreResult};
use crate::errors::StoreError;
use crate::session::{Event, SessionState, SessionSummary};

struct SessionRecord {
    created_at: DateTime<Utc>,
    state: SessionState,
    events: Vec<Event>,
}

/// In-process store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session_id: &str, state: &SessionState) -> StoreResult<()> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionRecord {
                created_at: Utc::now(),
                state: state.clone(),
                events: Vec::new(),
            });
        Ok(())
    }

    async fn session_exists(&self, session_id: &str) -> StoreResult<bool> {
        Ok(self.sessions.lock().await.contains_key(session_id))
    }

    async fn get_state(&self, session_id: &str) -> StoreResult<SessionState> {
        let sessions = self.sessions.lock().await;
        let record = sessions
            .get(session_id)
            .ok_or_else(|| StoreError::SessionNotFound {
                id: session_id.to_string(),
            })?;
        Ok(record.state.clone())
    }

    async fn put_state(&self, session_id: &str, state: &SessionState) -> StoreResult<()> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::SessionNotFound {
                id: session_id.to_string(),
            })?;
        record.state = state.clone();
        Ok(())
    }

    async fn clear_state(&self, session_id: &str) -> StoreResult<()> {
        self.put_state(session_id, &SessionState::new()).await
    }

    async fn append_events(&self, session_id: &str, events: Vec<Event>) -> StoreResult<Vec<Event>> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::SessionNotFound {
                id: session_id.to_string(),
            })?;

        let mut stored = Vec::with_capacity(events.len());
        for mut event in events {
            event.seq = record.events.len() as u64 + 1;
            event.session_id = session_id.to_string();
            record.events.push(event.clone());
            stored.push(event);
        }
        Ok(stored)
    }

    async fn read_events(&self, session_id: &str) -> StoreResult<Vec<Event>> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .get(session_id)
            .map(|r| r.events.clone())
            .unwrap_or_default())
    }

    async fn list_sessions(&self) -> StoreResult<Vec<SessionSummary>> {
        let sessions = self.sessions.lock().await;
        let mut summaries: Vec<SessionSummary> = sessions
            .iter()
            .map(|(id, record)| SessionSummary {
                id: id.clone(),
                created_at: record.created_at,
                event_count: record.events.len() as u64,
                current_phase: record.state.current_phase(),
            })
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let store = MemoryStore::new();
        store
            .create_session("s1", &SessionState::starting_at(Phase::Discovery))
            .await
            .unwrap();
        store
            .put_state("s1", &SessionState::starting_at(Phase::Engagement))
            .await
            .unwrap();
        store
            .create_session("s1", &SessionState::starting_at(Phase::Discovery))
            .await
            .unwrap();

        let state = store.get_state("s1").await.unwrap();
        assert_eq!(state.current_phase(), Some(Phase::Engagement));
    }

    #[tokio::test]
    async fn test_append_assigns_sequence_numbers() {
        let store = MemoryStore::new();
        store.create_session("s1", &SessionState::new()).await.unwrap();

        let first = store
            .append_events("s1", vec![Event::user_input("s1", "hello")])
            .await
            .unwrap();
        let second = store
            .append_events(
                "s1",
                vec![
                    Event::message("s1", "w", "one"),
                    Event::message("s1", "w", "two"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(first[0].seq, 1);
        assert_eq!(second[0].seq, 2);
        assert_eq!(second[1].seq, 3);

        let log = store.read_events("s1").await.unwrap();
        let texts: Vec<String> = log.iter().map(|e| e.content_text()).collect();
        assert_eq!(texts, vec!["hello", "one", "two"]);
    }

    #[tokio::test]
    async fn test_clear_state_keeps_log() {
        let store = MemoryStore::new();
        store
            .create_session("s1", &SessionState::starting_at(Phase::Scheduling))
            .await
            .unwrap();
        store
            .append_events("s1", vec![Event::message("s1", "w", "kept")])
            .await
            .unwrap();

        store.clear_state("s1").await.unwrap();

        assert!(store.get_state("s1").await.unwrap().current_phase().is_none());
        assert_eq!(store.read_events("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_session_errors() {
        let store = MemoryStore::new();
        assert!(!store.session_exists("nope").await.unwrap());
        assert!(matches!(
            store.get_state("nope").await,
            Err(StoreError::SessionNotFound { .. })
        ));
        assert!(store.read_events("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_sessions_reports_phase_and_count() {
        let store = MemoryStore::new();
        store
            .create_session("s1", &SessionState::starting_at(Phase::Discovery))
            .await
            .unwrap();
        store
            .append_events("s1", vec![Event::user_input("s1", "hi")])
            .await
            .unwrap();

        let sessions = store.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].event_count, 1);
        assert_eq!(sessions[0].current_phase, Some(Phase::Discovery));
    }
}
