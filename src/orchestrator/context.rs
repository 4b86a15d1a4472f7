//! Per-invocation handle passed to a phase worker.
//!
//! Every event a worker produces goes through [`TurnContext::emit`]: it is
//! appended to the durable log first and then forwarded to the display sink,
//! so the log and the live view see the same order.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::errors::StoreError;
use crate::phase::{Phase, PhaseRegistry};
use crate::session::{Event, SessionState};
use crate::signals::{self, CompletionOutcome};
use crate::store::SessionStore;

/// Receiving end of the live event stream is owned by the caller.
pub type EventSender = mpsc::UnboundedSender<Event>;

pub struct TurnContext {
    session_id: String,
    author: String,
    phase: Phase,
    state: SessionState,
    user_input: Option<String>,
    store: Arc<dyn SessionStore>,
    registry: Arc<PhaseRegistry>,
    sink: Option<EventSender>,
    emitted: usize,
}

impl TurnContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: &str,
        author: &str,
        phase: Phase,
        state: SessionState,
        user_input: Option<String>,
        store: Arc<dyn SessionStore>,
        registry: Arc<PhaseRegistry>,
        sink: Option<EventSender>,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            author: author.to_string(),
            phase,
            state,
            user_input,
            store,
            registry,
            sink,
            emitted: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Name recorded as the author of emitted events.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Phase the worker was invoked for.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn registry(&self) -> &PhaseRegistry {
        &self.registry
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    /// Caller input for this invocation. None after an automatic hand-off.
    pub fn user_input(&self) -> Option<&str> {
        self.user_input.as_deref()
    }

    /// Number of events emitted so far in this invocation.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Full session log, oldest first.
    pub async fn history(&self) -> Result<Vec<Event>, StoreError> {
        self.store.read_events(&self.session_id).await
    }

    /// Append an event to the log, then forward it to the display sink.
    pub async fn emit(&mut self, event: Event) -> Result<Event, StoreError> {
        let mut stored = self
            .store
            .append_events(&self.session_id, vec![event])
            .await?;
        let event = stored.pop().ok_or_else(|| {
            StoreError::Database("append returned no event".to_string())
        })?;
        self.emitted += 1;

        if let Some(sink) = &self.sink
            && sink.send(event.clone()).is_err()
        {
            tracing::debug!(session_id = %self.session_id, "display sink closed; event kept in log only");
        }
        Ok(event)
    }

    pub async fn say(&mut self, text: impl Into<String>) -> Result<Event, StoreError> {
        let event = Event::message(&self.session_id, &self.author, text);
        self.emit(event).await
    }

    pub async fn tool_call(&mut self, name: &str, args: Value) -> Result<Event, StoreError> {
        let event = Event::tool_call(&self.session_id, &self.author, name, args);
        self.emit(event).await
    }

    pub async fn tool_result(
        &mut self,
        name: &str,
        output: impl Into<String>,
    ) -> Result<Event, StoreError> {
        let event = Event::tool_result(&self.session_id, &self.author, name, output);
        self.emit(event).await
    }

    /// Write the current state map through to the store.
    pub async fn persist_state(&mut self) -> Result<(), StoreError> {
        self.store.put_state(&self.session_id, &self.state).await
    }

    /// Invoke the completion signal for `task_name`.
    pub async fn complete_task(
        &mut self,
        task_name: &str,
        summary: &str,
    ) -> Result<CompletionOutcome, StoreError> {
        signals::mark_task_complete(self, task_name, summary).await
    }

    pub(crate) fn into_state(self) -> SessionState {
        self.state
    }
}
