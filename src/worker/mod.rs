//! Phase workers.
//!
//! Exactly one worker handles each non-terminal phase. The orchestrator picks
//! it out of a [`WorkerSet`] by phase value and hands it a [`TurnContext`];
//! the worker emits events through the context and, once its task is done,
//! calls [`TurnContext::complete_task`] before returning.

mod discovery;
mod engagement;
mod scheduling;

pub use discovery::{DiscoveryWorker, parse_book_proposal};
pub use engagement::{EngagementWorker, engagement_pack};
pub use scheduling::{
    DEFAULT_PAGES_PER_MINUTE, DateTool, MAX_PAGES_PER_MINUTE, ReadingSchedule, ScheduleRow,
    SchedulingWorker, build_schedule, parse_reading_minutes,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::WorkerError;
use crate::integrations::{ArtifactPublisher, MetadataLookup};
use crate::orchestrator::TurnContext;
use crate::phase::{Phase, PhaseRegistry};

/// State key holding the confirmed book.
pub const BOOK_KEY: &str = "book";

/// The book the session is about. Written by discovery, read by later phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookChoice {
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
}

impl std::fmt::Display for BookChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} by {}", self.title, self.author)
    }
}

#[async_trait]
pub trait Worker: Send + Sync {
    /// Author name recorded on emitted events.
    fn name(&self) -> &str;

    /// Handle one invocation. Returning early without signaling completion
    /// means the worker is waiting for more input.
    async fn execute(&self, ctx: &mut TurnContext) -> Result<(), WorkerError>;
}

/// Lookup table from phase to its worker.
#[derive(Clone, Default)]
pub struct WorkerSet {
    workers: HashMap<Phase, Arc<dyn Worker>>,
}

impl WorkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, phase: Phase, worker: Arc<dyn Worker>) -> Self {
        self.insert(phase, worker);
        self
    }

    pub fn insert(&mut self, phase: Phase, worker: Arc<dyn Worker>) {
        self.workers.insert(phase, worker);
    }

    pub fn get(&self, phase: Phase) -> Option<Arc<dyn Worker>> {
        self.workers.get(&phase).cloned()
    }

    /// First non-terminal phase of `registry` without a worker, if any.
    pub fn missing_for(&self, registry: &PhaseRegistry) -> Option<Phase> {
        registry
            .phases()
            .iter()
            .copied()
            .filter(|phase| !registry.is_terminal(*phase))
            .find(|phase| !self.workers.contains_key(phase))
    }

    /// The three reading-companion workers over the given integrations.
    pub fn standard(deps: WorkerDeps) -> Self {
        let WorkerDeps {
            lookup,
            publisher,
            pages_per_minute,
            dates,
        } = deps;

        Self::new()
            .with(Phase::Discovery, Arc::new(DiscoveryWorker::new()))
            .with(
                Phase::Scheduling,
                Arc::new(SchedulingWorker::new(
                    lookup.clone(),
                    publisher.clone(),
                    pages_per_minute,
                    dates,
                )),
            )
            .with(
                Phase::Engagement,
                Arc::new(EngagementWorker::new(lookup, publisher)),
            )
    }
}

/// Integrations shared by the standard workers.
pub struct WorkerDeps {
    pub lookup: Arc<dyn MetadataLookup>,
    pub publisher: Arc<dyn ArtifactPublisher>,
    pub pages_per_minute: f64,
    pub dates: DateTool,
}

const BOOK_SUMMARY_PREFIX: &str = "Book identified: ";

/// The confirmed book, from state or, after state loss, from discovery's
/// completion record in the log. A book found in the log is written back
/// into state.
pub(crate) async fn recall_book(ctx: &mut TurnContext) -> Result<Option<BookChoice>, WorkerError> {
    if let Some(book) = ctx.state().get_as::<BookChoice>(BOOK_KEY) {
        return Ok(Some(book));
    }

    let history = ctx.history().await?;
    let recalled = history
        .iter()
        .rev()
        .filter(|event| !event.is_user_input())
        .filter_map(|event| {
            let text = event.content_text();
            let start = text.find(BOOK_SUMMARY_PREFIX)? + BOOK_SUMMARY_PREFIX.len();
            let line = text[start..].lines().next()?;
            parse_book_proposal(line)
        })
        .next();

    if let Some(book) = &recalled {
        tracing::info!(book = %book, "recalled book from event log");
        ctx.state_mut()
            .set_as(BOOK_KEY, book)
            .map_err(|e| WorkerError::Other(e.into()))?;
    }
    Ok(recalled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{DirectoryPublisher, OfflineLookup};

    struct Idle;

    #[async_trait]
    impl Worker for Idle {
        fn name(&self) -> &str {
            "Idle"
        }

        async fn execute(&self, _ctx: &mut TurnContext) -> Result<(), WorkerError> {
            Ok(())
        }
    }

    #[test]
    fn test_missing_for_reports_first_gap() {
        let registry = PhaseRegistry::standard();
        let set = WorkerSet::new().with(Phase::Discovery, Arc::new(Idle));
        assert_eq!(set.missing_for(&registry), Some(Phase::Scheduling));
    }

    #[test]
    fn test_standard_set_covers_registry() {
        let dir = tempfile::tempdir().unwrap();
        let set = WorkerSet::standard(WorkerDeps {
            lookup: Arc::new(OfflineLookup),
            publisher: Arc::new(DirectoryPublisher::new(dir.path())),
            pages_per_minute: 0.5,
            dates: DateTool::system(),
        });
        assert_eq!(set.missing_for(&PhaseRegistry::standard()), None);
        assert!(set.get(Phase::Complete).is_none());
        assert_eq!(set.get(Phase::Discovery).unwrap().name(), "DiscoveryWorker");
    }

    #[tokio::test]
    async fn test_recall_book_from_log_after_state_loss() {
        use crate::session::{Event, SessionState};
        use crate::store::{MemoryStore, SessionStore};

        let store = Arc::new(MemoryStore::new());
        store.create_session("s1", &SessionState::new()).await.unwrap();
        store
            .append_events(
                "s1",
                vec![Event::tool_result(
                    "s1",
                    "DiscoveryWorker",
                    "mark_task_complete",
                    "Task 'book_discovery' marked as complete. Advancing to Scheduling. \
                     Summary: Book identified: Emma by Jane Austen isbn:9780141439587",
                )],
            )
            .await
            .unwrap();

        let mut ctx = TurnContext::new(
            "s1",
            "SchedulingWorker",
            Phase::Scheduling,
            SessionState::new(),
            None,
            store,
            Arc::new(PhaseRegistry::standard()),
            None,
        );
        let book = recall_book(&mut ctx).await.unwrap().unwrap();
        assert_eq!(book.title, "Emma");
        assert_eq!(book.author, "Jane Austen");
        assert_eq!(book.isbn.as_deref(), Some("9780141439587"));
        assert!(ctx.state().contains(BOOK_KEY));
    }

    #[test]
    fn test_book_choice_display() {
        let book = BookChoice {
            title: "Emma".to_string(),
            author: "Jane Austen".to_string(),
            isbn: None,
        };
        assert_eq!(book.to_string(), "Emma by Jane Austen");
    }
}
