/// Result of processing a line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Display a message to the user.
    Message(String),
    /// Leave the REPL.
    Quit,
    /// Start over with a new role.
    SetRole(String),
    /// Drop the current role.
    ExitRole,
    /// Blank line.
    Empty,
    /// Not a command - send it as a question.
    NotACommand,
}

pub fn handle_command(input: &str) -> CommandResult {
    let input = input.trim();
    if input.is_empty() {
        return CommandResult::Empty;
    }

    let parts: Vec<&str> = input.splitn(2, char::is_whitespace).collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/help" | "/h" => show_help(),
        "/quit" | "/q" => CommandResult::Quit,
        "/exit" => CommandResult::ExitRole,
        "/role" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /role <name>\nExample: /role journalist".into())
            } else {
                CommandResult::SetRole(arg.to_string())
            }
        }
        "/version" => CommandResult::Message(format!("Docent CLI v{}", env!("CARGO_PKG_VERSION"))),

        // Unknown command
        _ => {
            if input.starts_with('/') {
                CommandResult::Message(format!("Unknown command: {cmd}. Type /help for commands."))
            } else {
                CommandResult::NotACommand
            }
        }
    }
}

fn show_help() -> CommandResult {
    let help_text = "\
Docent CLI Commands

  /role <name>   Start over as journalist, lawyer, educator, ...
  /exit          Drop the current role
  /quit, /q      Leave
  /help, /h      Show this help
  /version       Show version

Anything else is sent as a question. Ctrl-C cancels a running search,
or leaves when nothing is running.";
    CommandResult::Message(help_text.into())
}
