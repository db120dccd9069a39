// Library interface for docent-cli so integration tests can reach the
// prompt, command and rendering modules.

pub mod commands;
pub mod input;
pub mod render;

pub use commands::{handle_command, CommandResult};
pub use input::{interruptible, next_input, spawn_interrupt_listener, Input};
pub use render::{format_event, print_event, Output};
