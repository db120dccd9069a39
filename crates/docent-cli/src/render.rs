use docent_core::{Message, MessageKind, SearchResult, SessionEvent};
use std::fmt::Write;

/// Where a rendered event goes. Answers on stdout, progress on stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stdout(String),
    Stderr(String),
}

pub fn print_event(event: &SessionEvent) {
    match format_event(event) {
        Some(Output::Stdout(text)) => println!("{text}"),
        Some(Output::Stderr(text)) => eprintln!("{text}"),
        None => {}
    }
}

pub fn format_event(event: &SessionEvent) -> Option<Output> {
    match event {
        SessionEvent::MessageAppended { message, .. } => format_message(message).map(Output::Stdout),
        SessionEvent::Reformulated { text, .. } => Some(Output::Stderr(format!("[searching for: {text}]"))),
        SessionEvent::ContextReceived { total, .. } => Some(Output::Stderr(format!("[{total} sources so far]"))),
        SessionEvent::Failed { error, .. } => Some(Output::Stderr(format!("[error: {error}]"))),
        SessionEvent::Cancelled { .. } => Some(Output::Stderr("[cancelled]".into())),
        SessionEvent::Completed { .. } => None,
    }
}

/// Assistant turns only; the user's own line is already on screen.
pub fn format_message(message: &Message) -> Option<String> {
    if message.kind == MessageKind::User {
        return None;
    }
    let mut out = message.content.clone();
    if let Some(ref results) = message.results {
        for (i, result) in results.iter().enumerate() {
            write_result(&mut out, i + 1, result);
        }
    }
    out.push('\n');
    Some(out)
}

fn write_result(out: &mut String, number: usize, result: &SearchResult) {
    let _ = write!(out, "\n{number}. {}", result.title);
    if !result.link.is_empty() {
        let _ = write!(out, "\n   {}", result.link);
    }
    if !result.summary.is_empty() {
        let _ = write!(out, "\n   {}", result.summary);
    }
    for citation in &result.citations {
        let _ = write!(out, "\n   [{}] {}", citation.id, citation.context);
    }
}
