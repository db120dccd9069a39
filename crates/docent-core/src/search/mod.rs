mod traits;
mod backend;
pub mod event_stream;
pub mod graphql;
pub mod query;
pub mod sse;

pub use traits::*;
pub use backend::HttpBackend;
pub use event_stream::EventStreamClient;
pub use graphql::GraphqlClient;
pub use query::SearchQuery;
pub use sse::{SseDecoder, SseEvent};
