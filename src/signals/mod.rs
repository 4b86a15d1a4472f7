//! Completion signaling for Bookish.
//!
//! A worker declares its task finished by calling [`mark_task_complete`]
//! (through `TurnContext::complete_task`). The signal consults the phase
//! registry, moves `current_phase` forward one step, and appends a completion
//! record whose text contains the marker phrase
//! `Task '<task_name>' marked as complete`. That phrase is what log recovery
//! looks for, so only accepted signals ever write it.

mod parser;

pub use parser::{MarkerParser, completion_marker, extract_completion_markers};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::StoreError;
use crate::orchestrator::TurnContext;
use crate::phase::Phase;

/// Tool name recorded on completion events.
pub const COMPLETION_TOOL: &str = "mark_task_complete";

/// What a completion signal did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// The current phase's task completed; the phase moved one step forward
    Advanced { task: String, from: Phase, to: Phase },
    /// The task was already behind the current phase; nothing changed
    AlreadyComplete { task: String, phase: Phase },
    /// The task belongs to a phase that has not started yet
    OutOfOrder { task: String, current: Phase },
    /// The task name is not in the registry
    UnknownTask { task: String },
}

impl CompletionOutcome {
    /// Whether the signal changed `current_phase`.
    pub fn transitioned(&self) -> bool {
        matches!(self, CompletionOutcome::Advanced { .. })
    }

    pub fn task(&self) -> &str {
        match self {
            CompletionOutcome::Advanced { task, .. }
            | CompletionOutcome::AlreadyComplete { task, .. }
            | CompletionOutcome::OutOfOrder { task, .. }
            | CompletionOutcome::UnknownTask { task } => task,
        }
    }
}

fn completed_fact_key(task_name: &str) -> String {
    format!("{}_completed", task_name)
}

/// Record completion of `task_name` and advance the workflow if it belongs to
/// the current phase.
///
/// Persists state before appending the single completion event, so a crash in
/// between leaves the phase advanced and recovery agrees with it once the
/// marker is written. Storage failures are returned to the caller and abort
/// the turn.
pub async fn mark_task_complete(
    ctx: &mut TurnContext,
    task_name: &str,
    summary: &str,
) -> Result<CompletionOutcome, StoreError> {
    let registry = ctx.registry().clone();
    let current = ctx
        .state()
        .current_phase()
        .unwrap_or_else(|| registry.first());

    let (outcome, text) = match registry.lookup(task_name) {
        None => (
            CompletionOutcome::UnknownTask {
                task: task_name.to_string(),
            },
            format!("Task '{}' not recognized. Staying in current phase.", task_name),
        ),
        Some(task) => {
            let current_index = registry.index_of(current).unwrap_or(0);
            let next_index = registry.index_of(task.next).unwrap_or(0);

            if task.phase == current {
                (
                    CompletionOutcome::Advanced {
                        task: task.name.clone(),
                        from: current,
                        to: task.next,
                    },
                    format!("{}. {}", completion_marker(&task.name), task.transition_message),
                )
            } else if next_index <= current_index {
                (
                    CompletionOutcome::AlreadyComplete {
                        task: task.name.clone(),
                        phase: current,
                    },
                    format!(
                        "{}. Already recorded; staying in {}.",
                        completion_marker(&task.name),
                        current
                    ),
                )
            } else {
                (
                    CompletionOutcome::OutOfOrder {
                        task: task.name.clone(),
                        current,
                    },
                    format!(
                        "Task '{}' cannot complete during phase '{}'. Staying in current phase.",
                        task.name, current
                    ),
                )
            }
        }
    };

    match &outcome {
        CompletionOutcome::Advanced { task, from, to } => {
            tracing::info!(task = %task, from = %from, to = %to, "task marked complete");
            ctx.state_mut().set(&completed_fact_key(task), json!(true));
            ctx.state_mut().set_current_phase(*to);
            ctx.persist_state().await?;
        }
        CompletionOutcome::AlreadyComplete { task, phase } => {
            tracing::info!(task = %task, phase = %phase, "completion re-asserted; phase unchanged");
            ctx.state_mut().set(&completed_fact_key(task), json!(true));
            ctx.persist_state().await?;
        }
        CompletionOutcome::OutOfOrder { task, current } => {
            tracing::warn!(task = %task, current = %current, "completion signal for a phase not yet reached");
        }
        CompletionOutcome::UnknownTask { task } => {
            tracing::warn!(task = %task, "completion signal for unknown task");
        }
    }

    let output = if summary.trim().is_empty() {
        text
    } else {
        format!("{} Summary: {}", text, summary.trim())
    };
    ctx.tool_result(COMPLETION_TOOL, output).await?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::PhaseRegistry;
    use crate::session::{EventKind, SessionState};
    use crate::store::{MemoryStore, SessionStore};
    use std::sync::Arc;

    async fn context_at(phase: Phase) -> (TurnContext, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .create_session("s1", &SessionState::starting_at(phase))
            .await
            .unwrap();
        let ctx = TurnContext::new(
            "s1",
            "TestWorker",
            phase,
            SessionState::starting_at(phase),
            None,
            store.clone(),
            Arc::new(PhaseRegistry::standard()),
            None,
        );
        (ctx, store)
    }

    fn only_output(events: &[crate::session::Event]) -> String {
        assert_eq!(events.len(), 1, "completion signal must append exactly one event");
        match &events[0].kind {
            EventKind::ToolResult { name, output } => {
                assert_eq!(name, COMPLETION_TOOL);
                output.clone()
            }
            other => panic!("Expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_each_task_advances_exactly_one_step() {
        let registry = PhaseRegistry::standard();
        for task in registry.tasks() {
            let (mut ctx, store) = context_at(task.phase).await;
            let outcome = ctx.complete_task(&task.name, "").await.unwrap();

            assert_eq!(
                outcome,
                CompletionOutcome::Advanced {
                    task: task.name.clone(),
                    from: task.phase,
                    to: task.next,
                }
            );
            assert_eq!(ctx.state().current_phase(), Some(task.next));
            let stored = store.get_state("s1").await.unwrap();
            assert_eq!(stored.current_phase(), Some(task.next));
            assert!(stored.flag(&format!("{}_completed", task.name)));
        }
    }

    #[tokio::test]
    async fn test_completion_record_carries_marker_and_summary() {
        let (mut ctx, store) = context_at(Phase::Discovery).await;
        ctx.complete_task("book_discovery", "Book identified: Emma by Jane Austen")
            .await
            .unwrap();

        let output = only_output(&store.read_events("s1").await.unwrap());
        assert!(output.contains("Task 'book_discovery' marked as complete"));
        assert!(output.contains("Advancing to Scheduling."));
        assert!(output.contains("Emma by Jane Austen"));
    }

    #[tokio::test]
    async fn test_unknown_task_leaves_phase_and_records_attempt() {
        let (mut ctx, store) = context_at(Phase::Scheduling).await;
        let outcome = ctx.complete_task("make_coffee", "").await.unwrap();

        assert!(!outcome.transitioned());
        assert!(matches!(outcome, CompletionOutcome::UnknownTask { .. }));
        assert_eq!(ctx.state().current_phase(), Some(Phase::Scheduling));

        let output = only_output(&store.read_events("s1").await.unwrap());
        assert!(output.contains("not recognized"));
        assert!(!output.contains("marked as complete"));
    }

    #[tokio::test]
    async fn test_double_signal_is_idempotent() {
        let (mut ctx, store) = context_at(Phase::Discovery).await;
        let first = ctx.complete_task("book_discovery", "").await.unwrap();
        let second = ctx.complete_task("book_discovery", "").await.unwrap();

        assert!(first.transitioned());
        assert_eq!(
            second,
            CompletionOutcome::AlreadyComplete {
                task: "book_discovery".to_string(),
                phase: Phase::Scheduling,
            }
        );
        assert_eq!(ctx.state().current_phase(), Some(Phase::Scheduling));
        assert_eq!(store.read_events("s1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_future_task_cannot_skip_phases() {
        let (mut ctx, store) = context_at(Phase::Discovery).await;
        let outcome = ctx
            .complete_task("engagement_generation", "")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CompletionOutcome::OutOfOrder {
                task: "engagement_generation".to_string(),
                current: Phase::Discovery,
            }
        );
        assert_eq!(ctx.state().current_phase(), Some(Phase::Discovery));
        let output = only_output(&store.read_events("s1").await.unwrap());
        assert!(!output.contains("marked as complete"));
    }

    #[tokio::test]
    async fn test_terminal_phase_never_moves() {
        let (mut ctx, _store) = context_at(Phase::Complete).await;
        let outcome = ctx
            .complete_task("engagement_generation", "")
            .await
            .unwrap();
        assert!(matches!(outcome, CompletionOutcome::AlreadyComplete { .. }));
        assert_eq!(ctx.state().current_phase(), Some(Phase::Complete));
    }
}
