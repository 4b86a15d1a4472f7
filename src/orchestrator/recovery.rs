//! Phase reconstruction from the event log.
//!
//! Used only when `current_phase` is missing from session state. Markers are
//! cumulative: completing a later phase implies every earlier one completed,
//! so the most advanced marker wins regardless of where it appears in the
//! log. Cost is one linear pass over the log (O(events x marker length)); no
//! index is kept because recovery only runs after state loss.

use serde::{Deserialize, Serialize};

use crate::phase::{Phase, PhaseRegistry};
use crate::session::Event;
use crate::signals::MarkerParser;

/// Outcome of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// Phase the session should resume in
    pub phase: Phase,
    /// Registered tasks with a marker in the log, in phase order
    pub completed_tasks: Vec<String>,
    /// Task whose marker decided the phase
    pub decisive_task: Option<String>,
    pub events_scanned: usize,
}

pub struct RecoveryScanner<'a> {
    registry: &'a PhaseRegistry,
    parser: MarkerParser,
}

impl<'a> RecoveryScanner<'a> {
    pub fn new(registry: &'a PhaseRegistry) -> Self {
        Self {
            registry,
            parser: MarkerParser::new(true),
        }
    }

    /// Scan the log oldest to newest. Pure: the same log always yields the same report.
    pub fn scan(&self, events: &[Event]) -> RecoveryReport {
        let mut most_advanced: Option<usize> = None;
        let mut seen = vec![false; self.registry.phases().len()];

        for event in events {
            // Markers are written by the completion signal, never by the caller.
            if event.is_user_input() {
                continue;
            }

            for task_name in self.parser.parse(&event.content_text()) {
                let Some(task) = self.registry.lookup(&task_name) else {
                    continue;
                };
                let Some(index) = self.registry.index_of(task.phase) else {
                    continue;
                };
                seen[index] = true;
                if most_advanced.is_none_or(|best| index > best) {
                    most_advanced = Some(index);
                }
            }
        }

        let decisive = most_advanced
            .map(|index| self.registry.phases()[index])
            .and_then(|phase| self.registry.task_for(phase));

        let phase = decisive
            .map(|task| task.next)
            .unwrap_or_else(|| self.registry.first());

        let completed_tasks = self
            .registry
            .phases()
            .iter()
            .enumerate()
            .filter(|(index, _)| seen[*index])
            .filter_map(|(_, phase)| self.registry.task_for(*phase))
            .map(|task| task.name.clone())
            .collect();

        RecoveryReport {
            phase,
            completed_tasks,
            decisive_task: decisive.map(|task| task.name.clone()),
            events_scanned: events.len(),
        }
    }
}
