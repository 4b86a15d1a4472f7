//! Session inspection and maintenance (`bookish status`, `events`,
//! `sessions`, `forget` and `recover`).

use anyhow::Result;
use console::style;

use bookish::config::Config;
use bookish::orchestrator::Orchestrator;
use bookish::session::EventKind;

async fn require_session(orchestrator: &Orchestrator, session_id: &str) -> Result<()> {
    if !orchestrator.store().session_exists(session_id).await? {
        anyhow::bail!(
            "Session '{}' not found. Run `bookish sessions` to list stored sessions.",
            session_id
        );
    }
    Ok(())
}

pub async fn cmd_status(config: &Config, session_id: &str) -> Result<()> {
    use bookish::ui::icons::{ARROW, CHECK};

    let orchestrator = config.build_orchestrator()?;
    require_session(&orchestrator, session_id).await?;

    let store = orchestrator.store();
    let state = store.get_state(session_id).await?;
    let events = store.read_events(session_id).await?;
    let registry = orchestrator.registry();

    println!();
    println!("Session {}", style(session_id).cyan().bold());
    println!("{}", "=".repeat(8 + session_id.len()));
    println!();

    match state.current_phase() {
        Some(current) => {
            let current_index = registry.index_of(current).unwrap_or(0);
            for (index, phase) in registry.phases().iter().enumerate() {
                let marker = if index < current_index {
                    format!("{}", CHECK)
                } else if index == current_index {
                    format!("{}", ARROW)
                } else {
                    "  ".to_string()
                };
                let label = match registry.task_for(*phase) {
                    Some(task) => format!("{} ({})", phase, task.name),
                    None => phase.to_string(),
                };
                if index == current_index {
                    println!("  {} {}", marker, style(label).bold());
                } else {
                    println!("  {} {}", marker, label);
                }
            }
        }
        None => {
            println!(
                "  Phase: {}",
                style("unknown; the next turn resumes from the event log").yellow()
            );
        }
    }

    println!();
    println!("Events: {}", events.len());
    if state.is_empty() {
        println!("State:  (empty)");
    } else {
        let keys: Vec<&str> = state.keys().map(String::as_str).collect();
        println!("State:  {}", keys.join(", "));
    }
    println!();
    Ok(())
}

pub async fn cmd_events(config: &Config, session_id: &str, json: bool) -> Result<()> {
    let orchestrator = config.build_orchestrator()?;
    require_session(&orchestrator, session_id).await?;

    let events = orchestrator.store().read_events(session_id).await?;
    if json {
        for event in &events {
            println!("{}", serde_json::to_string(event)?);
        }
        return Ok(());
    }

    if events.is_empty() {
        println!("No events recorded for session '{}'.", session_id);
        return Ok(());
    }

    for event in &events {
        let (kind, content) = match &event.kind {
            EventKind::UserInput { .. } => ("input", event.content_text()),
            EventKind::Message { .. } => ("message", event.content_text()),
            EventKind::ToolCall { .. } => ("call", event.content_text()),
            EventKind::ToolResult { name, output } => ("result", format!("{} -> {}", name, output)),
        };
        println!(
            "{:>4}  {}  {:<16} {:<8} {}",
            event.seq,
            style(event.timestamp.format("%H:%M:%S")).dim(),
            event.author,
            kind,
            content.replace('\n', " ")
        );
    }
    Ok(())
}

pub async fn cmd_sessions(config: &Config) -> Result<()> {
    let orchestrator = config.build_orchestrator()?;
    let sessions = orchestrator.store().list_sessions().await?;

    if sessions.is_empty() {
        println!("No sessions found. Run `bookish chat` to start one.");
        return Ok(());
    }

    println!();
    println!("{:<24} {:<12} {:>7}  Created", "Session", "Phase", "Events");
    println!("{}", "-".repeat(64));
    for session in &sessions {
        let phase = session
            .current_phase
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "{:<24} {:<12} {:>7}  {}",
            session.id,
            phase,
            session.event_count,
            session.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    Ok(())
}

pub async fn cmd_forget(config: &Config, yes: bool, session_id: &str) -> Result<()> {
    use dialoguer::Confirm;

    let orchestrator = config.build_orchestrator()?;
    require_session(&orchestrator, session_id).await?;

    if !yes {
        let confirm = Confirm::new()
            .with_prompt(format!(
                "Drop the state of session '{}'? The event log is kept.",
                session_id
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Forget cancelled");
            return Ok(());
        }
    }

    orchestrator.store().clear_state(session_id).await?;
    tracing::info!(session_id, "session state cleared");
    println!(
        "State of session '{}' cleared. The next turn resumes from the event log.",
        session_id
    );
    Ok(())
}

pub async fn cmd_recover(config: &Config, session_id: &str) -> Result<()> {
    let orchestrator = config.build_orchestrator()?;
    let report = orchestrator.recover_preview(session_id).await?;
    let stored = orchestrator
        .store()
        .get_state(session_id)
        .await?
        .current_phase();

    println!();
    println!("Recovery scan for session {}", style(session_id).cyan().bold());
    println!();
    println!("  Events scanned:  {}", report.events_scanned);
    if report.completed_tasks.is_empty() {
        println!("  Completed tasks: (none)");
    } else {
        println!("  Completed tasks: {}", report.completed_tasks.join(", "));
    }
    println!(
        "  Decisive task:   {}",
        report.decisive_task.as_deref().unwrap_or("(none)")
    );
    println!("  Recovered phase: {}", style(report.phase).bold());
    match stored {
        Some(phase) if phase == report.phase => {
            println!("  Stored phase:    {} (matches)", phase);
        }
        Some(phase) => {
            println!("  Stored phase:    {}", style(phase).yellow());
        }
        None => {
            println!("  Stored phase:    (none; the next turn uses the recovered phase)");
        }
    }
    println!();
    Ok(())
}
