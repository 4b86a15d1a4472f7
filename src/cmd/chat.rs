//! Conversation commands (`bookish chat` and `bookish say`).

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

use bookish::config::Config;
use bookish::orchestrator::{Orchestrator, TurnReport};
use bookish::ui::{EventRenderer, TurnUI};

const EXIT_WORDS: &[&str] = &["exit", "quit", "/exit", "/quit"];

/// Run one turn, rendering events as the orchestrator appends them.
/// Failed turns are shown as a generic retry line; details are logged.
async fn rendered_turn(
    orchestrator: &Orchestrator,
    ui: &Arc<TurnUI>,
    session_id: &str,
    input: Option<&str>,
) -> Option<TurnReport> {
    let phase = orchestrator
        .store()
        .get_state(session_id)
        .await
        .ok()
        .and_then(|state| state.current_phase());

    let (tx, rx) = mpsc::unbounded_channel();
    let renderer = EventRenderer::spawn(Arc::clone(ui), rx);

    ui.start_turn(phase);
    let result = orchestrator.run_turn(session_id, input, Some(tx)).await;
    // The sender is dropped with the turn, so the render task drains and exits
    renderer.finish().await;

    match result {
        Ok(report) => {
            ui.finish_turn(&report);
            Some(report)
        }
        Err(_) => {
            ui.fail_turn();
            None
        }
    }
}

pub async fn cmd_chat(config: &Config, session: Option<String>) -> Result<()> {
    use console::style;
    use dialoguer::{Input, theme::ColorfulTheme};

    let orchestrator = config.build_orchestrator()?;
    let ui = Arc::new(TurnUI::new(config.verbose));

    let session_id = session.unwrap_or_else(|| {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("chat-{}", &id[..8])
    });
    let resuming = orchestrator.store().session_exists(&session_id).await?;

    println!();
    println!(
        "{} {}",
        style("Session:").bold(),
        style(&session_id).cyan()
    );
    println!(
        "{}",
        style(format!(
            "Resume later with `bookish chat --session {}`. Type 'exit' to leave.",
            session_id
        ))
        .dim()
    );
    println!();

    if !resuming
        && let Some(report) = rendered_turn(&orchestrator, &ui, &session_id, None).await
        && report.is_complete()
    {
        return Ok(());
    }

    loop {
        let line: String = match Input::with_theme(&ColorfulTheme::default())
            .with_prompt("you")
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            Err(_) => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&line.to_lowercase().as_str()) {
            break;
        }

        if let Some(report) = rendered_turn(&orchestrator, &ui, &session_id, Some(line)).await
            && report.is_complete()
        {
            break;
        }
    }

    Ok(())
}

pub async fn cmd_say(config: &Config, session_id: &str, text: &str) -> Result<()> {
    let orchestrator = config.build_orchestrator()?;
    let ui = Arc::new(TurnUI::plain(config.verbose));

    match rendered_turn(&orchestrator, &ui, session_id, Some(text)).await {
        Some(_) => Ok(()),
        None => anyhow::bail!("Turn for session '{}' did not complete", session_id),
    }
}
