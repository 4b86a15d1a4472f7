use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::orchestrator::{RecoveryReport, TurnOutcome, TurnReport};
use crate::phase::Phase;
use crate::session::{Event, EventKind};
use crate::signals::COMPLETION_TOOL;
use crate::ui::icons::{ARROW, BOOK, CHECK, CROSS, SPARKLE, TOOL};

/// Message shown for any turn-fatal error. Details go to the log.
pub const TRY_AGAIN: &str = "Something went wrong, please try again.";

/// Render one event as a display line. Tool traffic other than completion
/// records is shown only in verbose mode.
pub fn format_event(event: &Event, verbose: bool) -> Option<String> {
    match &event.kind {
        EventKind::UserInput { text } => verbose.then(|| format!("{} {}", style("you:").dim(), text)),
        EventKind::Message { text } => Some(format!(
            "{}{} {}",
            BOOK,
            style(format!("{}:", event.author)).cyan().bold(),
            text
        )),
        EventKind::ToolCall { name, args } => verbose.then(|| {
            format!("  {}{}", TOOL, style(format!("{}({})", name, args)).dim())
        }),
        EventKind::ToolResult { name, output } if name == COMPLETION_TOOL => {
            Some(format!("{}{}", CHECK, style(output).green()))
        }
        EventKind::ToolResult { name, output } => {
            verbose.then(|| format!("  {}{}", TOOL, style(format!("{} -> {}", name, output)).dim()))
        }
    }
}

/// Terminal UI for one conversation, rendered with an `indicatif` spinner
/// while a turn is in flight.
pub struct TurnUI {
    spinner: ProgressBar,
    verbose: bool,
}

impl TurnUI {
    pub fn new(verbose: bool) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .expect("progress bar template is a valid static string"),
        );
        Self { spinner, verbose }
    }

    /// Hidden spinner for non-interactive output.
    pub fn plain(verbose: bool) -> Self {
        Self {
            spinner: ProgressBar::hidden(),
            verbose,
        }
    }

    fn print_line(&self, msg: impl AsRef<str>) {
        self.spinner.suspend(|| println!("{}", msg.as_ref()));
    }

    pub fn start_turn(&self, phase: Option<Phase>) {
        let label = phase.map(|p| p.to_string()).unwrap_or_else(|| "thinking".to_string());
        self.spinner.set_message(format!("{}", style(label).dim()));
        self.spinner.enable_steady_tick(Duration::from_millis(100));
    }

    pub fn show_event(&self, event: &Event) {
        if let Some(line) = format_event(event, self.verbose) {
            self.print_line(line);
        }
    }

    pub fn show_recovery(&self, report: &RecoveryReport) {
        self.print_line(format!(
            "{}",
            style(format!(
                "Resumed at {} from the conversation history ({} events scanned).",
                report.phase, report.events_scanned
            ))
            .yellow()
        ));
    }

    pub fn finish_turn(&self, report: &TurnReport) {
        self.spinner.finish_and_clear();
        if let Some(recovery) = &report.recovery
            && self.verbose
        {
            self.show_recovery(recovery);
        }
        if self.verbose {
            for transition in &report.transitions {
                self.print_line(format!(
                    "  {}{}",
                    ARROW,
                    style(format!("{} -> {}", transition.from, transition.to)).dim()
                ));
            }
        }
        if report.outcome == TurnOutcome::Completed {
            self.print_line(format!(
                "{}{}",
                SPARKLE,
                style("Your reading plan is complete. Enjoy the book!").green().bold()
            ));
        }
    }

    pub fn fail_turn(&self) {
        self.spinner.finish_and_clear();
        self.print_line(format!("{}{}", CROSS, style(TRY_AGAIN).red()));
    }
}

/// Background task printing a turn's events as they are appended.
pub struct EventRenderer {
    handle: JoinHandle<()>,
}

impl EventRenderer {
    /// Render until every sender of `rx` is dropped.
    pub fn spawn(ui: Arc<TurnUI>, mut rx: mpsc::UnboundedReceiver<Event>) -> Self {
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                ui.show_event(&event);
            }
        });
        Self { handle }
    }

    /// Wait for the queue to drain. Returns false if the task died early.
    pub async fn finish(self) -> bool {
        match self.handle.await {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(error = %err, "event renderer stopped early");
                false
            }
        }
    }
}
