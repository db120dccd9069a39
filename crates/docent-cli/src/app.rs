use anyhow::{Context, Result};
use docent_core::{DocentError, HttpBackend, QueryDispatcher, Session, SessionEvent, Settings};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Mutex;

use docent_cli::{
    handle_command, interruptible, next_input, render, spawn_interrupt_listener, CommandResult,
    Input,
};

/// Facets chosen on the command line.
pub struct SessionOptions {
    pub role: String,
    pub content_type: Option<String>,
    pub resource_type: Option<String>,
}

fn build(
    settings: &Settings,
    options: &SessionOptions,
) -> Result<(QueryDispatcher, UnboundedReceiver<SessionEvent>)> {
    let backend = HttpBackend::from_settings(settings).context("invalid backend settings")?;

    let mut session = Session::with_role(options.role.clone())
        .with_max_history_entries(settings.session.max_history_entries);
    if let Some(ref content_type) = options.content_type {
        session.set_content_type(content_type.clone());
    }
    if let Some(ref resource_type) = options.resource_type {
        session.set_resource_type(resource_type.clone());
    }

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let dispatcher = QueryDispatcher::from_settings(
        Arc::new(Mutex::new(session)),
        Arc::new(backend),
        settings,
    )
    .with_events(event_tx);

    Ok((dispatcher, event_rx))
}

// ── Single-prompt mode ──────────────────────────────────────────────────

pub async fn run_single_prompt(
    settings: &Settings,
    options: &SessionOptions,
    prompt: &str,
) -> Result<()> {
    let (dispatcher, mut event_rx) = build(settings, options)?;

    let Some(handle) = dispatcher.dispatch(prompt).await else {
        anyhow::bail!("empty question");
    };
    handle.wait().await?;

    let mut failed = false;
    while let Ok(event) = event_rx.try_recv() {
        failed |= matches!(event, SessionEvent::Failed { .. });
        render::print_event(&event);
    }
    if failed {
        anyhow::bail!("search request failed");
    }
    Ok(())
}

// ── Line-oriented REPL ──────────────────────────────────────────────────

pub async fn run_repl(settings: &Settings, options: &SessionOptions) -> Result<()> {
    let (dispatcher, mut event_rx) = build(settings, options)?;
    let mut interrupts = spawn_interrupt_listener();

    print_welcome(&dispatcher).await;
    println!("Type /help for commands. Ctrl-C cancels a search, or leaves at the prompt.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = match next_input(&mut lines, &mut interrupts).await? {
            Input::Line(line) => line,
            Input::Interrupted => {
                println!();
                break;
            }
            Input::Closed => break,
        };

        match handle_command(&line) {
            CommandResult::Quit => break,
            CommandResult::Empty => continue,
            CommandResult::Message(text) => {
                println!("{text}\n");
                continue;
            }
            CommandResult::ExitRole => {
                dispatcher.exit().await;
                drain_events(&mut event_rx);
                print_welcome(&dispatcher).await;
                continue;
            }
            CommandResult::SetRole(role) => {
                dispatcher.set_user_role(role).await;
                drain_events(&mut event_rx);
                print_welcome(&dispatcher).await;
                continue;
            }
            CommandResult::NotACommand => {}
        }

        let Some(handle) = dispatcher.dispatch(line.trim()).await else {
            continue;
        };

        let wait = handle.wait();
        tokio::pin!(wait);
        let outcome = match interruptible(&mut wait, &mut interrupts).await {
            Some(outcome) => outcome,
            None => {
                dispatcher.cancel().await;
                wait.await
            }
        };
        match outcome {
            Ok(()) | Err(DocentError::Cancelled) => {}
            Err(e) => tracing::warn!("Search task ended abnormally: {e}"),
        }

        drain_events(&mut event_rx);
    }

    Ok(())
}

fn drain_events(event_rx: &mut UnboundedReceiver<SessionEvent>) {
    while let Ok(event) = event_rx.try_recv() {
        render::print_event(&event);
    }
}

async fn print_welcome(dispatcher: &QueryDispatcher) {
    let session = dispatcher.session().lock().await;
    if let Some(welcome) = session.transcript().messages().first() {
        println!("{}\n", welcome.content);
    }
}
