//! Conversational search client core.
//!
//! A question goes through [`QueryDispatcher`] to a [`SearchBackend`]
//! (batch GraphQL or an event stream), and the reply comes back through
//! [`ResponseReconciler`] as append-only changes to a [`Session`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod search;
pub mod session;

// Re-export key types
pub use config::{Settings, TransportMode};
pub use dispatch::{QueryDispatcher, ResponseHandle, ResponseReconciler, SessionEvent, StreamIngester};
pub use error::DocentError;
pub use search::{Citation, HttpBackend, Reply, SearchBackend, SearchQuery, SearchResult, StreamFrame};
pub use session::{ConversationHistory, Filters, HistoryEntry, Message, MessageKind, Session, Transcript};
