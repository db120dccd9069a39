use crate::dispatch::{EventSink, SessionEvent};
use crate::error::DocentError;
use crate::search::{Reply, SearchResult};
use crate::session::{HistoryEntry, Message, Session};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

pub const RESULTS_PREAMBLE: &str = "Here's what I found:";
pub const APOLOGY_MESSAGE: &str = "Sorry, I encountered an error while searching.";

/// Turns a classified reply (or a failure) into history and transcript
/// appends. Every method is a no-op for a generation that no longer owns
/// the session.
#[derive(Debug, Clone, Default)]
pub struct ResponseReconciler {
    events: EventSink,
}

impl ResponseReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, tx: UnboundedSender<SessionEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    /// Apply a completed exchange. Returns false if the reply was stale.
    pub fn apply(
        &self,
        session: &mut Session,
        generation: u64,
        request_id: Uuid,
        question: &str,
        reply: Reply,
    ) -> bool {
        if !self.owns(session, generation, request_id) {
            return false;
        }

        let message = match reply {
            Reply::FollowUp { text } => {
                tracing::debug!(%request_id, "Backend asked a follow-up question");
                session.record_follow_up(HistoryEntry::new("user", question, text.clone()));
                Message::assistant(text)
            }
            Reply::Results { items } => {
                tracing::debug!(%request_id, results = items.len(), "Backend returned results");
                report_dangling_citations(request_id, &items);
                Message::assistant_with_results(RESULTS_PREAMBLE, items)
            }
            Reply::Answer { text, sources } => {
                report_dangling_citations(request_id, &sources);
                if sources.is_empty() {
                    Message::assistant(text)
                } else {
                    Message::assistant_with_results(text, sources)
                }
            }
        };

        self.append(session, message);
        session.finish_request(generation);
        self.events.send(SessionEvent::Completed { request_id });
        true
    }

    /// Apply the fixed apology for a failed exchange. History is untouched.
    pub fn apply_failure(
        &self,
        session: &mut Session,
        generation: u64,
        request_id: Uuid,
        error: &DocentError,
    ) -> bool {
        if !self.owns(session, generation, request_id) {
            return false;
        }

        tracing::warn!(%request_id, "Search request failed: {error}");
        self.append(session, Message::assistant(APOLOGY_MESSAGE));
        session.finish_request(generation);
        self.events.send(SessionEvent::Failed {
            request_id,
            error: error.to_string(),
        });
        true
    }

    /// Surface a reformulated question without touching the transcript.
    pub fn note_reformulated(
        &self,
        session: &Session,
        generation: u64,
        request_id: Uuid,
        text: String,
    ) -> bool {
        if !self.owns(session, generation, request_id) {
            return false;
        }
        tracing::debug!(%request_id, "Backend reformulated the question: {text}");
        self.events
            .send(SessionEvent::Reformulated { request_id, text });
        true
    }

    pub fn note_context(
        &self,
        session: &Session,
        generation: u64,
        request_id: Uuid,
        total: usize,
    ) -> bool {
        if !self.owns(session, generation, request_id) {
            return false;
        }
        self.events
            .send(SessionEvent::ContextReceived { request_id, total });
        true
    }

    pub(crate) fn append(&self, session: &mut Session, message: Message) -> usize {
        let index = session.append_message(message.clone());
        self.events
            .send(SessionEvent::MessageAppended { index, message });
        index
    }

    pub(crate) fn notify(&self, event: SessionEvent) {
        self.events.send(event);
    }

    fn owns(&self, session: &Session, generation: u64, request_id: Uuid) -> bool {
        if session.is_current(generation) {
            return true;
        }
        tracing::debug!(
            %request_id,
            generation,
            current = session.generation(),
            "Discarding stale response"
        );
        false
    }
}

fn report_dangling_citations(request_id: Uuid, results: &[SearchResult]) {
    for result in results {
        let dangling = result.dangling_citations();
        if !dangling.is_empty() {
            tracing::warn!(
                %request_id,
                title = %result.title,
                ?dangling,
                "Summary references citations the backend did not send"
            );
        }
    }
}
