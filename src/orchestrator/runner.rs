use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Instrument, error, info, warn};

use super::context::{EventSender, TurnContext};
use super::recovery::{RecoveryReport, RecoveryScanner};
use crate::errors::OrchestratorError;
use crate::phase::{Phase, PhaseRegistry};
use crate::session::{Event, SessionState};
use crate::store::SessionStore;
use crate::worker::WorkerSet;

/// Default bound on worker invocations within one external turn.
pub const DEFAULT_MAX_LOOPS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The last worker yielded without completing its task.
    AwaitingInput,
    /// The terminal phase has been reached.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
}

/// What one external turn did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReport {
    pub session_id: String,
    /// Phase the session is in after the turn
    pub phase: Phase,
    pub outcome: TurnOutcome,
    /// Number of worker invocations performed
    pub invocations: usize,
    pub transitions: Vec<Transition>,
    /// Present when the phase had to be rebuilt from the event log
    pub recovery: Option<RecoveryReport>,
}

impl TurnReport {
    pub fn is_complete(&self) -> bool {
        self.outcome == TurnOutcome::Completed
    }
}

/// Drives sessions through the phase chain one external turn at a time.
///
/// Turns for the same session must not run concurrently; callers serialize
/// them. Nothing here locks session state.
pub struct Orchestrator {
    store: Arc<dyn SessionStore>,
    registry: Arc<PhaseRegistry>,
    workers: WorkerSet,
    max_loops: usize,
}

impl Orchestrator {
    /// Validate the registry and worker coverage. Misconfiguration is rejected
    /// here, before any session runs.
    pub fn new(
        store: Arc<dyn SessionStore>,
        registry: PhaseRegistry,
        workers: WorkerSet,
        max_loops: usize,
    ) -> Result<Self, OrchestratorError> {
        registry.validate()?;
        if let Some(phase) = workers.missing_for(&registry) {
            return Err(OrchestratorError::MissingWorker { phase });
        }

        Ok(Self {
            store,
            registry: Arc::new(registry),
            workers,
            max_loops,
        })
    }

    pub fn registry(&self) -> &PhaseRegistry {
        &self.registry
    }

    pub fn store(&self) -> Arc<dyn SessionStore> {
        self.store.clone()
    }

    pub fn max_loops(&self) -> usize {
        self.max_loops
    }

    /// Create the session at the first phase if it does not exist yet.
    pub async fn ensure_session(&self, session_id: &str) -> Result<(), OrchestratorError> {
        if !self.store.session_exists(session_id).await? {
            info!(session_id, phase = %self.registry.first(), "starting new session");
            self.store
                .create_session(session_id, &SessionState::starting_at(self.registry.first()))
                .await?;
        }
        Ok(())
    }

    /// Read `current_phase`, rebuilding it from the event log when it is
    /// missing. A rebuilt phase is written back to the store.
    pub async fn resolve_phase(
        &self,
        session_id: &str,
    ) -> Result<(Phase, SessionState, Option<RecoveryReport>), OrchestratorError> {
        let mut state = self.store.get_state(session_id).await?;

        if let Some(phase) = state.current_phase() {
            return Ok((phase, state, None));
        }

        let events = self.store.read_events(session_id).await?;
        let report = RecoveryScanner::new(&self.registry).scan(&events);
        info!(
            session_id,
            phase = %report.phase,
            events_scanned = report.events_scanned,
            decisive_task = report.decisive_task.as_deref().unwrap_or("none"),
            "recovered phase from event log"
        );

        state.set_current_phase(report.phase);
        self.store.put_state(session_id, &state).await?;
        Ok((report.phase, state, Some(report)))
    }

    /// Scan the log without touching session state.
    pub async fn recover_preview(&self, session_id: &str) -> Result<RecoveryReport, OrchestratorError> {
        if !self.store.session_exists(session_id).await? {
            return Err(crate::errors::StoreError::SessionNotFound {
                id: session_id.to_string(),
            }
            .into());
        }
        let events = self.store.read_events(session_id).await?;
        Ok(RecoveryScanner::new(&self.registry).scan(&events))
    }

    /// Process one external turn.
    ///
    /// `input` is handed to the first worker only. After an automatic
    /// hand-off the next worker runs with no input. Any error aborts the
    /// turn; events already appended stay in the log.
    pub async fn run_turn(
        &self,
        session_id: &str,
        input: Option<&str>,
        sink: Option<EventSender>,
    ) -> Result<TurnReport, OrchestratorError> {
        let turn_id = uuid::Uuid::new_v4().simple().to_string();
        let span = tracing::info_span!("turn", session_id, turn = %&turn_id[..8]);

        async move {
            let result = self.drive(session_id, input, sink).await;
            if let Err(err) = &result {
                error!(error = %err, kind = ?err.kind(), "turn aborted");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        session_id: &str,
        input: Option<&str>,
        sink: Option<EventSender>,
    ) -> Result<TurnReport, OrchestratorError> {
        self.ensure_session(session_id).await?;

        let input = input.map(str::trim).filter(|text| !text.is_empty());
        if let Some(text) = input {
            self.store
                .append_events(session_id, vec![Event::user_input(session_id, text)])
                .await?;
        }

        let (mut phase, mut state, recovery) = self.resolve_phase(session_id).await?;
        let mut pending_input = input.map(str::to_string);
        let mut invocations = 0;
        let mut transitions = Vec::new();

        let outcome = loop {
            if self.registry.is_terminal(phase) {
                break TurnOutcome::Completed;
            }

            if invocations >= self.max_loops {
                warn!(limit = self.max_loops, phase = %phase, "iteration bound reached");
                return Err(OrchestratorError::IterationLimitExceeded {
                    limit: self.max_loops,
                    phase,
                });
            }

            let worker = self
                .workers
                .get(phase)
                .ok_or(OrchestratorError::MissingWorker { phase })?;

            let phase_before = phase;
            let mut ctx = TurnContext::new(
                session_id,
                worker.name(),
                phase_before,
                state,
                pending_input.take(),
                self.store.clone(),
                self.registry.clone(),
                sink.clone(),
            );

            invocations += 1;
            info!(phase = %phase_before, worker = worker.name(), invocation = invocations, "invoking worker");
            worker
                .execute(&mut ctx)
                .await
                .map_err(|source| OrchestratorError::Worker {
                    phase: phase_before,
                    source,
                })?;

            state = ctx.into_state();
            let phase_after = state.current_phase().unwrap_or(phase_before);

            if phase_after == phase_before {
                break TurnOutcome::AwaitingInput;
            }

            info!(from = %phase_before, to = %phase_after, "phase transition; handing off");
            transitions.push(Transition {
                from: phase_before,
                to: phase_after,
            });
            phase = phase_after;
        };

        // Facts gathered by the last worker.
        self.store.put_state(session_id, &state).await?;

        Ok(TurnReport {
            session_id: session_id.to_string(),
            phase,
            outcome,
            invocations,
            transitions,
            recovery,
        })
    }
}
