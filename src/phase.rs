//! Workflow phases and the static completion-task registry.
//!
//! This module provides:
//! - `Phase`, the closed set of workflow stages (plus the terminal `Complete`)
//! - `CompletionTask`, the one task whose completion moves a phase forward
//! - `PhaseRegistry`, the total function `task_name -> next_phase` together
//!   with the canonical phase order used by log recovery
//!
//! The registry is validated once at startup; a registry that branches,
//! cycles, or leaves a phase without a completion task is rejected before any
//! session can run.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::RegistryError;

/// A named stage of the reading-companion workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Conversation to pick one book
    Discovery,
    /// Daily reading plan based on the reader's available time
    Scheduling,
    /// First-chapter engagement material
    Engagement,
    /// Terminal: every task has completed
    Complete,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Discovery,
        Phase::Scheduling,
        Phase::Engagement,
        Phase::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Discovery => "discovery",
            Phase::Scheduling => "scheduling",
            Phase::Engagement => "engagement",
            Phase::Complete => "complete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "discovery" => Ok(Phase::Discovery),
            "scheduling" => Ok(Phase::Scheduling),
            "engagement" => Ok(Phase::Engagement),
            "complete" => Ok(Phase::Complete),
            _ => anyhow::bail!(
                "Invalid phase '{}'. Valid values: discovery, scheduling, engagement, complete",
                s
            ),
        }
    }
}

/// The task a phase's worker completes to hand off to the next phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionTask {
    /// Task name passed to the completion signal (e.g. "book_discovery")
    pub name: String,
    /// Phase this task belongs to
    pub phase: Phase,
    /// Phase entered once the task completes
    pub next: Phase,
    /// Human-readable suffix appended to the completion record
    pub transition_message: String,
}

impl CompletionTask {
    pub fn new(name: &str, phase: Phase, next: Phase, transition_message: &str) -> Self {
        Self {
            name: name.to_string(),
            phase,
            next,
            transition_message: transition_message.to_string(),
        }
    }
}

/// Read-only mapping from completion task to successor phase.
#[derive(Debug, Clone)]
pub struct PhaseRegistry {
    sequence: Vec<Phase>,
    tasks: Vec<CompletionTask>,
}

impl PhaseRegistry {
    /// Build a registry and validate it.
    pub fn new(sequence: Vec<Phase>, tasks: Vec<CompletionTask>) -> Result<Self, RegistryError> {
        let registry = Self { sequence, tasks };
        registry.validate()?;
        Ok(registry)
    }

    /// The discovery -> scheduling -> engagement -> complete chain.
    pub fn standard() -> Self {
        Self {
            sequence: Phase::ALL.to_vec(),
            tasks: vec![
                CompletionTask::new(
                    "book_discovery",
                    Phase::Discovery,
                    Phase::Scheduling,
                    "Advancing to Scheduling.",
                ),
                CompletionTask::new(
                    "schedule_creation",
                    Phase::Scheduling,
                    Phase::Engagement,
                    "Advancing to Engagement.",
                ),
                CompletionTask::new(
                    "engagement_generation",
                    Phase::Engagement,
                    Phase::Complete,
                    "Workflow Complete.",
                ),
            ],
        }
    }

    /// Check that the registry forms one linear chain ending in the terminal phase.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();
        for phase in &self.sequence {
            if !seen.insert(*phase) {
                return Err(RegistryError::Cycle { phase: *phase });
            }
        }

        let mut names = HashSet::new();
        for task in &self.tasks {
            if !names.insert(task.name.as_str()) {
                return Err(RegistryError::DuplicateTask {
                    task: task.name.clone(),
                });
            }
        }

        let Some(terminal) = self.sequence.last().copied() else {
            return Err(RegistryError::EmptySequence);
        };

        for (index, phase) in self.sequence.iter().enumerate() {
            let outbound: Vec<&CompletionTask> =
                self.tasks.iter().filter(|t| t.phase == *phase).collect();

            if *phase == terminal {
                if !outbound.is_empty() {
                    return Err(RegistryError::TerminalHasMapping { phase: *phase });
                }
                continue;
            }

            let task = match outbound.as_slice() {
                [] => return Err(RegistryError::MissingMapping { phase: *phase }),
                [task] => *task,
                _ => return Err(RegistryError::BranchingPhase { phase: *phase }),
            };

            let expected = self.sequence[index + 1];
            if task.next != expected {
                let points_back = self
                    .index_of(task.next)
                    .is_none_or(|next_index| next_index <= index);
                if points_back {
                    return Err(RegistryError::Cycle { phase: *phase });
                }
                return Err(RegistryError::NonLinear {
                    from: *phase,
                    expected,
                    actual: task.next,
                });
            }
        }

        // Tasks attached to phases outside the sequence can never fire.
        if let Some(stray) = self.tasks.iter().find(|t| self.index_of(t.phase).is_none()) {
            return Err(RegistryError::MissingMapping { phase: stray.phase });
        }

        Ok(())
    }

    pub fn first(&self) -> Phase {
        self.sequence.first().copied().unwrap_or(Phase::Discovery)
    }

    pub fn terminal(&self) -> Phase {
        self.sequence.last().copied().unwrap_or(Phase::Complete)
    }

    pub fn is_terminal(&self, phase: Phase) -> bool {
        phase == self.terminal()
    }

    /// Position of a phase in the canonical order.
    pub fn index_of(&self, phase: Phase) -> Option<usize> {
        self.sequence.iter().position(|p| *p == phase)
    }

    pub fn phases(&self) -> &[Phase] {
        &self.sequence
    }

    /// Completion tasks in phase order.
    pub fn tasks(&self) -> impl Iterator<Item = &CompletionTask> {
        self.sequence
            .iter()
            .filter_map(|phase| self.tasks.iter().find(|t| t.phase == *phase))
    }

    /// Look up a completion task by name.
    pub fn lookup(&self, task_name: &str) -> Option<&CompletionTask> {
        self.tasks.iter().find(|t| t.name == task_name)
    }

    /// Successor phase for a completion task.
    pub fn next_phase(&self, task_name: &str) -> Option<Phase> {
        self.lookup(task_name).map(|t| t.next)
    }

    /// The completion task owned by a phase (None for the terminal phase).
    pub fn task_for(&self, phase: Phase) -> Option<&CompletionTask> {
        self.tasks.iter().find(|t| t.phase == phase)
    }
}

impl Default for PhaseRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
