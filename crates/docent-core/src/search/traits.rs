use crate::error::DocentError;
use crate::search::query::SearchQuery;
use crate::search::sse::SseEvent;
use futures::stream::BoxStream;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Title the backend puts on the first result when it wants to ask a
/// clarifying question instead of returning documents.
pub const FOLLOW_UP_TITLE: &str = "follow-up";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub context: String,
}

/// One ranked document returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    /// Source kind reported by streamed context (`pdf`, `youtube`, ...).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_seconds: Option<u64>,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        summary: impl Into<String>,
        citations: Vec<Citation>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            summary: summary.into(),
            citations,
            kind: None,
            timestamp_seconds: None,
        }
    }

    /// Citation markers (`[id]`) in the summary that have no matching
    /// entry in `citations`, in order of first appearance.
    pub fn dangling_citations(&self) -> Vec<String> {
        let known: HashSet<&str> = self.citations.iter().map(|c| c.id.as_str()).collect();
        let mut seen = HashSet::new();
        citation_marker()
            .captures_iter(&self.summary)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .filter(|id| !known.contains(id) && seen.insert(*id))
            .map(str::to_string)
            .collect()
    }
}

fn citation_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"\[([^\[\]\s]+)\]").unwrap())
}

/// A classified backend reply. Built once at the transport boundary so the
/// rest of the crate never inspects raw result fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The backend needs more information before it can answer.
    FollowUp { text: String },
    /// Terminal result set; may be empty.
    Results { items: Vec<SearchResult> },
    /// Streamed answer text together with whatever sources were streamed
    /// alongside it.
    Answer {
        text: String,
        sources: Vec<SearchResult>,
    },
}

impl Reply {
    /// Classify the `askLlm` array. Anything that is not a well-formed
    /// follow-up is treated as a result set.
    pub fn from_items(items: Vec<Value>) -> Self {
        if let Some(text) = items.first().and_then(follow_up_text) {
            return Reply::FollowUp { text };
        }

        let mut results = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<SearchResult>(item) {
                Ok(result) => results.push(result),
                Err(e) => tracing::warn!(index, "Dropping malformed search result: {e}"),
            }
        }
        Reply::Results { items: results }
    }

    pub fn is_follow_up(&self) -> bool {
        matches!(self, Reply::FollowUp { .. })
    }
}

fn follow_up_text(first: &Value) -> Option<String> {
    if first.get("title")?.as_str()? != FOLLOW_UP_TITLE {
        return None;
    }
    first.get("summary")?.as_str().map(str::to_string)
}

/// A decoded payload from the event stream, routed by its distinguishing key.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    Context {
        order: Option<u64>,
        sources: Vec<SearchResult>,
    },
    Reformulated {
        order: Option<u64>,
        text: String,
    },
    Message {
        order: Option<u64>,
        text: String,
    },
}

/// Source entry as the streaming endpoint sends it. Video sources carry
/// `content` instead of `summary`.
#[derive(Debug, Deserialize)]
struct ContextSource {
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    timestamp_seconds: Option<u64>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl From<ContextSource> for SearchResult {
    fn from(source: ContextSource) -> Self {
        Self {
            title: source.title,
            link: source.link,
            summary: source.summary.or(source.content).unwrap_or_default(),
            citations: Vec::new(),
            kind: source.kind,
            timestamp_seconds: source.timestamp_seconds,
        }
    }
}

impl StreamPayload {
    /// Route a parsed event by the first of `context`, `reformulated`,
    /// `message` it carries. Returns `None` for unrecognized shapes.
    pub fn from_value(value: Value) -> Option<Self> {
        let order = value.get("order").and_then(Value::as_u64);

        if let Some(context) = value.get("context") {
            let entries = context.as_array()?;
            let mut sources = Vec::with_capacity(entries.len());
            for entry in entries {
                match serde_json::from_value::<ContextSource>(entry.clone()) {
                    Ok(source) => sources.push(source.into()),
                    Err(e) => tracing::warn!("Dropping malformed context source: {e}"),
                }
            }
            return Some(StreamPayload::Context { order, sources });
        }

        if let Some(text) = value.get("reformulated") {
            return Some(StreamPayload::Reformulated {
                order,
                text: text.as_str()?.to_string(),
            });
        }

        if let Some(text) = value.get("message") {
            return Some(StreamPayload::Message {
                order,
                text: text.as_str()?.to_string(),
            });
        }

        None
    }

    pub fn order(&self) -> Option<u64> {
        match self {
            StreamPayload::Context { order, .. }
            | StreamPayload::Reformulated { order, .. }
            | StreamPayload::Message { order, .. } => *order,
        }
    }
}

/// Connection-level frames produced by a streaming transport.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Open { status: u16 },
    Event(SseEvent),
    Error(String),
    Closed,
}

/// Dropping the stream closes the underlying connection.
pub type FrameStream = BoxStream<'static, StreamFrame>;

/// The backend seam. Implementations provide both the batch call and the
/// streaming subscription.
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    /// Issue one batch request and classify its reply.
    async fn ask(&self, query: &SearchQuery) -> Result<Reply, DocentError>;

    /// Open an event-stream subscription for the query.
    async fn subscribe(&self, query: &SearchQuery) -> Result<FrameStream, DocentError>;
}
