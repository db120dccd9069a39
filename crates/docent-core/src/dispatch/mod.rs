mod dispatcher;
mod ingester;
mod reconciler;

pub use dispatcher::{QueryDispatcher, ResponseHandle};
pub use ingester::{IngestState, IngestStep, StreamIngester};
pub use reconciler::{ResponseReconciler, APOLOGY_MESSAGE, RESULTS_PREAMBLE};

use crate::session::Message;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Notifications for the view layer, emitted after the session changed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MessageAppended { index: usize, message: Message },
    /// The backend restated the question it is answering.
    Reformulated { request_id: Uuid, text: String },
    /// Partial sources arrived on a stream; `total` counts the whole turn.
    ContextReceived { request_id: Uuid, total: usize },
    Completed { request_id: Uuid },
    Failed { request_id: Uuid, error: String },
    Cancelled { request_id: Uuid },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink(Option<UnboundedSender<SessionEvent>>);

impl EventSink {
    pub(crate) fn new(tx: UnboundedSender<SessionEvent>) -> Self {
        Self(Some(tx))
    }

    pub(crate) fn send(&self, event: SessionEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}
