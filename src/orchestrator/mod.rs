//! Turn processing: phase resolution, worker dispatch, automatic hand-off.

pub mod context;
pub mod recovery;
pub mod runner;

pub use context::{EventSender, TurnContext};
pub use recovery::{RecoveryReport, RecoveryScanner};
pub use runner::{DEFAULT_MAX_LOOPS, Orchestrator, Transition, TurnOutcome, TurnReport};
