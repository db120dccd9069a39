use std::future::Future;
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// What the prompt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    Interrupted,
    Closed,
}

/// Forward every Ctrl-C for the lifetime of the process.
///
/// Once tokio owns SIGINT the default handler is gone, so every await
/// point in the REPL has to watch this channel.
pub fn spawn_interrupt_listener() -> UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Could not listen for Ctrl-C: {e}");
                break;
            }
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Run `future` unless an interrupt arrives first. A closed interrupt
/// channel never interrupts.
pub async fn interruptible<F: Future>(
    future: F,
    interrupts: &mut UnboundedReceiver<()>,
) -> Option<F::Output> {
    tokio::pin!(future);
    tokio::select! {
        output = &mut future => Some(output),
        Some(()) = interrupts.recv() => None,
    }
}

/// Read the next prompt line, or report Ctrl-C / end of input.
pub async fn next_input<R>(
    lines: &mut Lines<R>,
    interrupts: &mut UnboundedReceiver<()>,
) -> std::io::Result<Input>
where
    R: AsyncBufRead + Unpin,
{
    match interruptible(lines.next_line(), interrupts).await {
        None => Ok(Input::Interrupted),
        Some(line) => Ok(match line? {
            Some(line) => Input::Line(line),
            None => Input::Closed,
        }),
    }
}
