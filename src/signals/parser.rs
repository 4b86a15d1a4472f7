//! Completion marker parsing.
//!
//! Extracts task names from text containing
//! `Task '<task_name>' marked as complete`.

use regex::Regex;
use std::sync::LazyLock;

// Compile once using LazyLock
static MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Task '([A-Za-z0-9_\-]+)' marked as complete")
        .expect("completion marker regex is valid")
});

/// The exact phrase a completion record carries for `task_name`.
pub fn completion_marker(task_name: &str) -> String {
    format!("Task '{}' marked as complete", task_name)
}

/// Parser for extracting completion markers from event text.
pub struct MarkerParser {
    /// Whether to log every marker found
    verbose: bool,
}

impl MarkerParser {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Task names whose completion marker appears in `text`, in order of appearance.
    pub fn parse(&self, text: &str) -> Vec<String> {
        let mut tasks = Vec::new();
        for cap in MARKER_REGEX.captures_iter(text) {
            if let Some(task) = cap.get(1) {
                if self.verbose {
                    tracing::debug!(task = task.as_str(), "completion marker found");
                }
                tasks.push(task.as_str().to_string());
            }
        }
        tasks
    }
}

/// Convenience function to extract markers without creating a parser.
pub fn extract_completion_markers(text: &str) -> Vec<String> {
    MarkerParser::new(false).parse(text)
}
