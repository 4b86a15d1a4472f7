//! Immutable records appended to a session's event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Author name used for caller-supplied turns.
pub const USER_AUTHOR: &str = "user";

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A turn delivered by the external caller
    UserInput { text: String },
    /// Text produced by a worker for display
    Message { text: String },
    /// A tool invocation with its arguments
    ToolCall { name: String, args: Value },
    /// The result returned by a tool
    ToolResult { name: String, output: String },
}

/// One ordered occurrence within a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub session_id: String,
    /// Position in the session log, assigned by the store on append (1-based)
    #[serde(default)]
    pub seq: u64,
    pub author: String,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(session_id: &str, author: &str, kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            seq: 0,
            author: author.to_string(),
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn user_input(session_id: &str, text: &str) -> Self {
        Self::new(
            session_id,
            USER_AUTHOR,
            EventKind::UserInput {
                text: text.to_string(),
            },
        )
    }

    pub fn message(session_id: &str, author: &str, text: impl Into<String>) -> Self {
        Self::new(session_id, author, EventKind::Message { text: text.into() })
    }

    pub fn tool_call(session_id: &str, author: &str, name: &str, args: Value) -> Self {
        Self::new(
            session_id,
            author,
            EventKind::ToolCall {
                name: name.to_string(),
                args,
            },
        )
    }

    pub fn tool_result(session_id: &str, author: &str, name: &str, output: impl Into<String>) -> Self {
        Self::new(
            session_id,
            author,
            EventKind::ToolResult {
                name: name.to_string(),
                output: output.into(),
            },
        )
    }

    /// Textual content searched by log recovery.
    pub fn content_text(&self) -> String {
        match &self.kind {
            EventKind::UserInput { text } | EventKind::Message { text } => text.clone(),
            EventKind::ToolCall { name, args } => format!("{}({})", name, args),
            EventKind::ToolResult { output, .. } => output.clone(),
        }
    }

    pub fn is_user_input(&self) -> bool {
        matches!(self.kind, EventKind::UserInput { .. })
    }
}
