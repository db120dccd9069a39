use crate::config::{Settings, TransportMode};
use crate::dispatch::ingester::{IngestStep, StreamIngester};
use crate::dispatch::reconciler::ResponseReconciler;
use crate::dispatch::SessionEvent;
use crate::error::DocentError;
use crate::search::{SearchBackend, SearchQuery};
use crate::session::{Message, Session};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Handle to one dispatched question.
#[derive(Debug)]
pub struct ResponseHandle {
    id: Uuid,
    generation: u64,
    task: JoinHandle<()>,
    session: Arc<Mutex<Session>>,
    reconciler: ResponseReconciler,
}

impl ResponseHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel this request if it is still the pending one. Returns false when
    /// it already finished or was superseded.
    pub async fn cancel(&self) -> bool {
        let mut session = self.session.lock().await;
        match session.cancel_generation(self.generation) {
            Some(request_id) => {
                tracing::info!(%request_id, "Cancelled request");
                self.reconciler
                    .notify(SessionEvent::Cancelled { request_id });
                true
            }
            None => false,
        }
    }

    /// Wait for the request task. `Err(Cancelled)` if a newer question or an
    /// explicit cancel superseded it.
    pub async fn wait(self) -> Result<(), DocentError> {
        match self.task.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Err(DocentError::Cancelled),
            Err(e) => Err(DocentError::Stream(format!("request task failed: {e}"))),
        }
    }
}

/// Turns user input into backend requests, keeping at most one in flight.
pub struct QueryDispatcher {
    session: Arc<Mutex<Session>>,
    backend: Arc<dyn SearchBackend>,
    mode: TransportMode,
    request_timeout: Option<Duration>,
    stream_idle_timeout: Option<Duration>,
    reconciler: ResponseReconciler,
}

impl QueryDispatcher {
    pub fn new(session: Arc<Mutex<Session>>, backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            session,
            backend,
            mode: TransportMode::Batch,
            request_timeout: None,
            stream_idle_timeout: None,
            reconciler: ResponseReconciler::new(),
        }
    }

    pub fn from_settings(
        session: Arc<Mutex<Session>>,
        backend: Arc<dyn SearchBackend>,
        settings: &Settings,
    ) -> Self {
        Self::new(session, backend)
            .with_mode(settings.backend.transport)
            .with_request_timeout(settings.backend.request_timeout())
            .with_stream_idle_timeout(settings.backend.stream_idle_timeout())
    }

    pub fn with_mode(mut self, mode: TransportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_stream_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    pub fn with_events(mut self, tx: UnboundedSender<SessionEvent>) -> Self {
        self.reconciler = self.reconciler.with_events(tx);
        self
    }

    pub fn session(&self) -> &Arc<Mutex<Session>> {
        &self.session
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    /// Send a question. Blank input is ignored and returns `None`.
    ///
    /// The user's turn is appended before any network activity, and any
    /// request still in flight is cancelled first so two answers can never
    /// interleave.
    pub async fn dispatch(&self, query_text: &str) -> Option<ResponseHandle> {
        if query_text.trim().is_empty() {
            return None;
        }

        let id = Uuid::new_v4();
        let mut session = self.session.lock().await;

        if let Some(previous) = session.cancel_pending() {
            tracing::info!(%previous, "Cancelled in-flight request for a newer question");
            self.reconciler
                .notify(SessionEvent::Cancelled { request_id: previous });
        }

        let generation = session.begin_request(id);
        self.reconciler
            .append(&mut session, Message::user(query_text));
        let query = SearchQuery::new(query_text, session.history(), session.filters());

        tracing::debug!(%id, generation, mode = ?self.mode, "Dispatching question");

        let task = match self.mode {
            TransportMode::Batch => tokio::spawn(run_batch(
                self.session.clone(),
                self.backend.clone(),
                self.reconciler.clone(),
                self.request_timeout,
                id,
                generation,
                query,
            )),
            TransportMode::Stream => tokio::spawn(run_stream(
                self.session.clone(),
                self.backend.clone(),
                self.reconciler.clone(),
                self.stream_idle_timeout,
                id,
                generation,
                query,
            )),
        };
        session.attach_task(generation, task.abort_handle());

        Some(ResponseHandle {
            id,
            generation,
            task,
            session: self.session.clone(),
            reconciler: self.reconciler.clone(),
        })
    }

    /// Cancel the in-flight request without sending a new one.
    pub async fn cancel(&self) -> bool {
        let mut session = self.session.lock().await;
        match session.cancel_pending() {
            Some(request_id) => {
                tracing::info!(%request_id, "Cancelled in-flight request");
                self.reconciler
                    .notify(SessionEvent::Cancelled { request_id });
                true
            }
            None => false,
        }
    }

    /// Change role through the dispatcher so a cancelled request is
    /// reported to event listeners.
    pub async fn set_user_role(&self, role: impl Into<String>) {
        let cancelled = self.session.lock().await.set_user_role(role);
        if let Some(request_id) = cancelled {
            self.reconciler
                .notify(SessionEvent::Cancelled { request_id });
        }
    }

    pub async fn exit(&self) {
        self.set_user_role("").await;
    }

    pub async fn is_pending(&self) -> bool {
        self.session.lock().await.is_pending()
    }
}

async fn run_batch(
    session: Arc<Mutex<Session>>,
    backend: Arc<dyn SearchBackend>,
    reconciler: ResponseReconciler,
    timeout: Option<Duration>,
    id: Uuid,
    generation: u64,
    query: SearchQuery,
) {
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, backend.ask(&query)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(DocentError::Timeout(limit)),
        },
        None => backend.ask(&query).await,
    };

    let mut session = session.lock().await;
    match outcome {
        Ok(reply) => reconciler.apply(&mut session, generation, id, &query.prompt, reply),
        Err(e) => reconciler.apply_failure(&mut session, generation, id, &e),
    };
}

async fn run_stream(
    session: Arc<Mutex<Session>>,
    backend: Arc<dyn SearchBackend>,
    reconciler: ResponseReconciler,
    idle_timeout: Option<Duration>,
    id: Uuid,
    generation: u64,
    query: SearchQuery,
) {
    let mut ingester = StreamIngester::new().with_idle_timeout(idle_timeout);
    ingester.begin();

    let subscribed = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, backend.subscribe(&query)).await {
            Ok(subscribed) => subscribed,
            Err(_) => Err(DocentError::Timeout(limit)),
        },
        None => backend.subscribe(&query).await,
    };

    let mut frames = match subscribed {
        Ok(frames) => frames,
        Err(e) => {
            let step = ingester.connect_failed(e);
            finish(&session, &reconciler, id, generation, &query, step).await;
            return;
        }
    };

    loop {
        let step = ingester.next_step(&mut frames).await;
        match step {
            IngestStep::Reformulated(text) => {
                let session = session.lock().await;
                if !reconciler.note_reformulated(&session, generation, id, text) {
                    return;
                }
            }
            IngestStep::Context { total } => {
                let session = session.lock().await;
                if !reconciler.note_context(&session, generation, id, total) {
                    return;
                }
            }
            step @ (IngestStep::Complete(_) | IngestStep::Failed(_)) => {
                finish(&session, &reconciler, id, generation, &query, step).await;
                return;
            }
        }
    }
}

async fn finish(
    session: &Mutex<Session>,
    reconciler: &ResponseReconciler,
    id: Uuid,
    generation: u64,
    query: &SearchQuery,
    step: IngestStep,
) {
    let mut session = session.lock().await;
    match step {
        IngestStep::Complete(reply) => {
            reconciler.apply(&mut session, generation, id, &query.prompt, reply);
        }
        IngestStep::Failed(e) => {
            reconciler.apply_failure(&mut session, generation, id, &e);
        }
        IngestStep::Reformulated(_) | IngestStep::Context { .. } => {}
    }
}
