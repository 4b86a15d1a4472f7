//! Integration tests for Bookish
//!
//! These drive the `bookish` binary end to end against a SQLite store in a
//! temporary project, with the metadata service disabled and artifacts
//! written to the project directory.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const OFFLINE_CONFIG: &str = r#"
[metadata]
enabled = false

[publisher]
kind = "directory"
"#;

/// Helper to create a bookish Command isolated from the caller's environment
fn bookish() -> Command {
    let mut cmd = cargo_bin_cmd!("bookish");
    cmd.env_remove("GITHUB_TOKEN")
        .env_remove("GOOGLE_BOOKS_API_KEY")
        .env_remove("BOOKISH_MAX_LOOPS")
        .env("BOOKISH_LOG", "off");
    cmd
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Helper to initialize a project that never touches the network
fn init_offline_project(dir: &TempDir) {
    bookish()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();
    fs::write(dir.path().join(".bookish/bookish.toml"), OFFLINE_CONFIG).unwrap();
}

fn say(dir: &TempDir, session: &str, text: &str) -> assert_cmd::assert::Assert {
    bookish()
        .current_dir(dir.path())
        .args(["say", "--session", session, text])
        .assert()
}

fn artifact_count(dir: &TempDir) -> usize {
    fs::read_dir(dir.path().join(".bookish/artifacts"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_bookish_help() {
        bookish().arg("--help").assert().success();
    }

    #[test]
    fn test_bookish_version() {
        bookish().arg("--version").assert().success();
    }

    #[test]
    fn test_bookish_init_creates_structure() {
        let dir = create_temp_project();

        bookish()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized bookish project"));

        assert!(dir.path().join(".bookish/bookish.toml").exists());
        assert!(dir.path().join(".bookish/artifacts").is_dir());
    }

    #[test]
    fn test_bookish_init_idempotent() {
        let dir = create_temp_project();
        init_offline_project(&dir);

        bookish()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already initialized"));

        // Existing configuration is left alone
        let content = fs::read_to_string(dir.path().join(".bookish/bookish.toml")).unwrap();
        assert!(content.contains("enabled = false"));
    }

    #[test]
    fn test_sessions_empty() {
        let dir = create_temp_project();
        init_offline_project(&dir);

        bookish()
            .current_dir(dir.path())
            .arg("sessions")
            .assert()
            .success()
            .stdout(predicate::str::contains("No sessions found"));
    }

    #[test]
    fn test_status_unknown_session_fails() {
        let dir = create_temp_project();
        init_offline_project(&dir);

        bookish()
            .current_dir(dir.path())
            .args(["status", "--session", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found"));
    }
}

// =============================================================================
// Configuration Tests
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();

        bookish()
            .current_dir(dir.path())
            .arg("config")
            .arg("show")
            .assert()
            .success()
            .stdout(predicate::str::contains("Using default configuration"))
            .stdout(predicate::str::contains("max_loops = 5"));
    }

    #[test]
    fn test_config_init_creates_toml() {
        let dir = create_temp_project();

        bookish()
            .current_dir(dir.path())
            .arg("config")
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Created bookish.toml"));

        assert!(dir.path().join(".bookish/bookish.toml").exists());
    }

    #[test]
    fn test_config_validate_offline_config_is_valid() {
        let dir = create_temp_project();
        init_offline_project(&dir);

        bookish()
            .current_dir(dir.path())
            .arg("config")
            .arg("validate")
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid."));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        init_offline_project(&dir);
        fs::write(
            dir.path().join(".bookish/bookish.toml"),
            "[orchestrator]\nmax_loops = 0\n\n[metadata]\nenabled = false\n",
        )
        .unwrap();

        bookish()
            .current_dir(dir.path())
            .arg("config")
            .arg("validate")
            .assert()
            .success()
            .stdout(predicate::str::contains("max_loops is 0"));
    }

    #[test]
    fn test_config_shows_toml_content() {
        let dir = create_temp_project();
        init_offline_project(&dir);
        fs::write(
            dir.path().join(".bookish/bookish.toml"),
            "[orchestrator]\nmax_loops = 7\n\n[scheduling]\npages_per_minute = 0.75\n",
        )
        .unwrap();

        bookish()
            .current_dir(dir.path())
            .arg("config")
            .arg("show")
            .assert()
            .success()
            .stdout(predicate::str::contains("max_loops = 7"))
            .stdout(predicate::str::contains("pages_per_minute = 0.75"));
    }
}

// =============================================================================
// Conversation Tests
// =============================================================================

mod conversation {
    use super::*;

    #[test]
    fn test_say_clarifying_question_waits_for_input() {
        let dir = create_temp_project();
        init_offline_project(&dir);

        say(&dir, "s1", "Emma by Jane Austen")
            .success()
            .stdout(predicate::str::contains("Shall we go with this one?"));

        bookish()
            .current_dir(dir.path())
            .args(["status", "--session", "s1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("discovery (book_discovery)"));
    }

    #[test]
    fn test_confirmation_hands_off_to_scheduling_in_same_turn() {
        let dir = create_temp_project();
        init_offline_project(&dir);

        say(&dir, "s1", "Emma by Jane Austen").success();
        say(&dir, "s1", "yes")
            .success()
            .stdout(predicate::str::contains("Task 'book_discovery' marked as complete"))
            .stdout(predicate::str::contains("How many pages does your edition have?"));

        bookish()
            .current_dir(dir.path())
            .args(["sessions"])
            .assert()
            .success()
            .stdout(predicate::str::contains("s1"))
            .stdout(predicate::str::contains("scheduling"));
    }

    #[test]
    fn test_full_conversation_reaches_complete() {
        let dir = create_temp_project();
        init_offline_project(&dir);

        say(&dir, "s1", "Emma by Jane Austen").success();
        say(&dir, "s1", "yes").success();
        say(&dir, "s1", "474 pages")
            .success()
            .stdout(predicate::str::contains("How many minutes per day"));
        say(&dir, "s1", "30 minutes")
            .success()
            .stdout(predicate::str::contains("Task 'schedule_creation' marked as complete"))
            .stdout(predicate::str::contains("Happy reading!"))
            .stdout(predicate::str::contains("Your reading plan is complete"));

        // Schedule and engagement pack
        assert_eq!(artifact_count(&dir), 2);

        // Terminal phase: further input invokes no worker
        say(&dir, "s1", "hello again")
            .success()
            .stdout(predicate::str::contains("Your reading plan is complete"));
        assert_eq!(artifact_count(&dir), 2);
    }

    #[test]
    fn test_events_lists_completion_record() {
        let dir = create_temp_project();
        init_offline_project(&dir);

        say(&dir, "s1", "Emma by Jane Austen").success();
        say(&dir, "s1", "yes").success();

        bookish()
            .current_dir(dir.path())
            .args(["events", "--session", "s1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("input"))
            .stdout(predicate::str::contains("mark_task_complete"));

        bookish()
            .current_dir(dir.path())
            .args(["events", "--session", "s1", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"type\":\"tool_result\""));
    }

    #[test]
    fn test_ephemeral_say_leaves_no_database() {
        let dir = create_temp_project();
        init_offline_project(&dir);

        bookish()
            .current_dir(dir.path())
            .args(["--ephemeral", "say", "--session", "tmp", "Dune by Frank Herbert"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"Dune\" by Frank Herbert"));

        assert!(!dir.path().join(".bookish/sessions.db").exists());
    }
}

// =============================================================================
// Recovery Tests
// =============================================================================

mod recovery {
    use super::*;

    #[test]
    fn test_forget_then_recover_reports_log_phase() {
        let dir = create_temp_project();
        init_offline_project(&dir);

        say(&dir, "s1", "Emma by Jane Austen").success();
        say(&dir, "s1", "yes").success();

        bookish()
            .current_dir(dir.path())
            .args(["--yes", "forget", "--session", "s1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cleared"));

        bookish()
            .current_dir(dir.path())
            .args(["status", "--session", "s1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("resumes from the event log"));

        bookish()
            .current_dir(dir.path())
            .args(["recover", "--session", "s1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Decisive task:   book_discovery"))
            .stdout(predicate::str::contains("Recovered phase: scheduling"));
    }

    #[test]
    fn test_next_turn_after_forget_resumes_at_scheduling() {
        let dir = create_temp_project();
        init_offline_project(&dir);

        say(&dir, "s1", "Emma by Jane Austen").success();
        say(&dir, "s1", "yes").success();

        bookish()
            .current_dir(dir.path())
            .args(["--yes", "forget", "--session", "s1"])
            .assert()
            .success();

        // State is gone; the book comes back from discovery's completion record
        say(&dir, "s1", "474")
            .success()
            .stdout(predicate::str::contains("\"Emma\""))
            .stdout(predicate::str::contains("Shall we go with this one?").not());
    }

    #[test]
    fn test_iteration_limit_renders_generic_error() {
        let dir = create_temp_project();
        init_offline_project(&dir);

        say(&dir, "s1", "Emma by Jane Austen").success();

        bookish()
            .current_dir(dir.path())
            .args(["--max-loops", "1", "say", "--session", "s1", "yes"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("Something went wrong, please try again."));

        // The completion signal was persisted before the limit was hit
        bookish()
            .current_dir(dir.path())
            .args(["recover", "--session", "s1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("(matches)"));
    }
}
