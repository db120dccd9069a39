use crate::error::DocentError;
use crate::search::{FrameStream, Reply, SearchResult, SseEvent, StreamFrame, StreamPayload};
use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;

/// Connection lifecycle of one streamed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Idle,
    Opening,
    Open,
    Closed,
    Errored,
}

/// What the dispatcher has to act on next.
#[derive(Debug)]
pub enum IngestStep {
    Reformulated(String),
    /// New sources arrived; `total` counts every source so far this turn.
    Context { total: usize },
    Complete(Reply),
    Failed(DocentError),
}

/// Adapts an event stream into the completion signal the reconciler
/// consumes. Events are applied strictly in arrival order.
#[derive(Debug)]
pub struct StreamIngester {
    state: IngestState,
    idle_timeout: Option<Duration>,
    sources: Vec<SearchResult>,
    reformulated: Option<String>,
    last_order: Option<u64>,
}

impl StreamIngester {
    pub fn new() -> Self {
        Self {
            state: IngestState::Idle,
            idle_timeout: None,
            sources: Vec::new(),
            reformulated: None,
            last_order: None,
        }
    }

    /// Fail the turn when no frame arrives within `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    pub fn reformulated(&self) -> Option<&str> {
        self.reformulated.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, IngestState::Closed | IngestState::Errored)
    }

    /// Mark the subscription as being opened.
    pub fn begin(&mut self) {
        if self.state == IngestState::Idle {
            self.state = IngestState::Opening;
        }
    }

    /// The subscription could not be established at all.
    pub fn connect_failed(&mut self, error: DocentError) -> IngestStep {
        self.fail(error)
    }

    /// Pull frames until something the dispatcher must act on happens.
    pub async fn next_step(&mut self, frames: &mut FrameStream) -> IngestStep {
        loop {
            if self.is_terminal() {
                return IngestStep::Failed(DocentError::Stream("stream already finished".into()));
            }

            let frame = match self.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, frames.next()).await {
                    Ok(frame) => frame,
                    Err(_) => return self.fail(DocentError::Timeout(limit)),
                },
                None => frames.next().await,
            };

            let Some(frame) = frame else {
                return self.on_end();
            };

            if let Some(step) = self.on_frame(frame) {
                return step;
            }
        }
    }

    /// Apply one frame. `None` means keep reading.
    pub fn on_frame(&mut self, frame: StreamFrame) -> Option<IngestStep> {
        match frame {
            StreamFrame::Open { status } => self.on_open(status),
            StreamFrame::Event(event) => self.on_event(event),
            StreamFrame::Error(message) => Some(self.fail(DocentError::Stream(message))),
            StreamFrame::Closed => Some(self.on_close()),
        }
    }

    fn on_open(&mut self, status: u16) -> Option<IngestStep> {
        if self.state != IngestState::Opening {
            tracing::debug!(status, state = ?self.state, "Ignoring unexpected open frame");
            return None;
        }
        match status {
            200..=299 => {
                tracing::debug!(status, "Event stream open");
                self.state = IngestState::Open;
                None
            }
            400..=499 if status != 429 => Some(self.fail(DocentError::ClientRejected(status))),
            _ => Some(self.fail(DocentError::status(status, "event stream refused"))),
        }
    }

    fn on_event(&mut self, event: SseEvent) -> Option<IngestStep> {
        if self.state == IngestState::Opening {
            tracing::debug!("Event arrived before open; treating stream as open");
            self.state = IngestState::Open;
        }

        let value: Value = match serde_json::from_str(&event.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Discarding unparseable stream event: {e}");
                return None;
            }
        };

        let Some(payload) = StreamPayload::from_value(value) else {
            tracing::warn!(event = ?event.event, "Discarding unrecognized stream payload");
            return None;
        };

        if let Some(order) = payload.order() {
            if self.last_order.is_some_and(|last| order < last) {
                tracing::debug!(order, last = ?self.last_order, "Stream event arrived out of order");
            }
            self.last_order = Some(order);
        }

        match payload {
            StreamPayload::Context { sources, .. } => {
                self.sources.extend(sources);
                Some(IngestStep::Context {
                    total: self.sources.len(),
                })
            }
            StreamPayload::Reformulated { text, .. } => {
                self.reformulated = Some(text.clone());
                Some(IngestStep::Reformulated(text))
            }
            StreamPayload::Message { text, .. } => {
                self.state = IngestState::Closed;
                Some(IngestStep::Complete(Reply::Answer {
                    text,
                    sources: std::mem::take(&mut self.sources),
                }))
            }
        }
    }

    fn on_close(&mut self) -> IngestStep {
        if self.state == IngestState::Opening {
            return self.fail(DocentError::Stream("stream closed before opening".into()));
        }
        tracing::debug!(sources = self.sources.len(), "Event stream closed by the server");
        self.state = IngestState::Closed;
        IngestStep::Complete(Reply::Results {
            items: std::mem::take(&mut self.sources),
        })
    }

    fn on_end(&mut self) -> IngestStep {
        match self.state {
            IngestState::Open => self.on_close(),
            _ => self.fail(DocentError::Stream("stream ended before opening".into())),
        }
    }

    fn fail(&mut self, error: DocentError) -> IngestStep {
        self.state = IngestState::Errored;
        IngestStep::Failed(error)
    }
}

impl Default for StreamIngester {
    fn default() -> Self {
        Self::new()
    }
}
