mod filters;
mod history;
mod transcript;

pub use filters::{welcome_message, Filters};
pub use history::{ConversationHistory, HistoryEntry};
pub use transcript::{Message, MessageKind, Transcript};

use tokio::task::AbortHandle;
use uuid::Uuid;

/// The request currently allowed to mutate the session.
#[derive(Debug)]
pub struct PendingRequest {
    pub id: Uuid,
    pub generation: u64,
    abort: Option<AbortHandle>,
}

impl PendingRequest {
    fn cancel(self) {
        if let Some(abort) = self.abort {
            abort.abort();
        }
    }
}

/// Everything one conversation owns: transcript, dialogue memory, filters
/// and the single in-flight request.
///
/// Created on role selection and reset on role change or exit. Only the
/// request whose generation matches [`Session::generation`] may append.
#[derive(Debug)]
pub struct Session {
    transcript: Transcript,
    history: ConversationHistory,
    filters: Filters,
    pending: Option<PendingRequest>,
    generation: u64,
    max_history_entries: Option<usize>,
}

impl Session {
    /// A session with no role selected yet.
    pub fn new() -> Self {
        Self::with_role("")
    }

    pub fn with_role(role: impl Into<String>) -> Self {
        let role = role.into();
        let mut transcript = Transcript::new();
        transcript.append(Message::assistant(welcome_message(&role)));
        Self {
            transcript,
            history: ConversationHistory::new(),
            filters: Filters::for_role(role),
            pending: None,
            generation: 0,
            max_history_entries: None,
        }
    }

    pub fn with_max_history_entries(mut self, max: Option<usize>) -> Self {
        self.max_history_entries = max;
        self.history = std::mem::take(&mut self.history).with_max_entries(max);
        self
    }

    /// Select a role: cancels any pending request and starts a fresh
    /// transcript and history seeded with the role-aware welcome. Returns
    /// the id of the request that was cancelled, if any.
    pub fn set_user_role(&mut self, role: impl Into<String>) -> Option<Uuid> {
        let role = role.into();
        let cancelled = self.cancel_pending();
        if let Some(id) = cancelled {
            tracing::debug!(%id, "Cancelled pending request on role change");
        }
        self.transcript = Transcript::new();
        self.transcript
            .append(Message::assistant(welcome_message(&role)));
        self.history = ConversationHistory::new().with_max_entries(self.max_history_entries);
        self.filters.role_filter = role;
        tracing::info!(role = %self.filters.role_filter, "Session reset");
        cancelled
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.filters.content_type = content_type.into();
    }

    pub fn set_resource_type(&mut self, resource_type: impl Into<String>) {
        self.filters.resource_type = resource_type.into();
    }

    /// Leave the current role and return to the unselected state.
    pub fn exit(&mut self) -> Option<Uuid> {
        self.set_user_role("")
    }

    pub fn role(&self) -> &str {
        &self.filters.role_filter
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn pending_request(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `generation` still owns the session.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
            && self
                .pending
                .as_ref()
                .is_some_and(|p| p.generation == generation)
    }

    /// Cancel the in-flight request, if any, and invalidate its generation.
    pub(crate) fn cancel_pending(&mut self) -> Option<Uuid> {
        let pending = self.pending.take()?;
        let id = pending.id;
        pending.cancel();
        self.generation += 1;
        Some(id)
    }

    /// Cancel the in-flight request only if it belongs to `generation`.
    pub(crate) fn cancel_generation(&mut self, generation: u64) -> Option<Uuid> {
        if !self.is_current(generation) {
            return None;
        }
        self.cancel_pending()
    }

    /// Register a new request as the only one allowed to mutate the session.
    /// Any previous request must already have been cancelled.
    pub(crate) fn begin_request(&mut self, id: Uuid) -> u64 {
        debug_assert!(self.pending.is_none());
        self.generation += 1;
        self.pending = Some(PendingRequest {
            id,
            generation: self.generation,
            abort: None,
        });
        self.generation
    }

    pub(crate) fn attach_task(&mut self, generation: u64, abort: AbortHandle) {
        match self.pending.as_mut() {
            Some(pending) if pending.generation == generation => pending.abort = Some(abort),
            _ => abort.abort(),
        }
    }

    pub(crate) fn finish_request(&mut self, generation: u64) {
        if self.pending.as_ref().is_some_and(|p| p.generation == generation) {
            self.pending = None;
        }
    }

    pub(crate) fn append_message(&mut self, message: Message) -> usize {
        self.transcript.append(message)
    }

    pub(crate) fn record_follow_up(&mut self, entry: HistoryEntry) {
        self.history.append(entry);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
