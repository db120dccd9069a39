use crate::config::Settings;
use crate::error::DocentError;
use crate::search::event_stream::EventStreamClient;
use crate::search::graphql::GraphqlClient;
use crate::search::query::SearchQuery;
use crate::search::traits::{FrameStream, Reply, SearchBackend};

/// The real backend: GraphQL for batch questions, SSE for streamed ones.
/// Both share one connection pool.
#[derive(Clone)]
pub struct HttpBackend {
    graphql: GraphqlClient,
    events: EventStreamClient,
}

impl HttpBackend {
    pub fn new(graphql: GraphqlClient, events: EventStreamClient) -> Self {
        Self { graphql, events }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, DocentError> {
        settings.validate()?;
        let backend = &settings.backend;
        let client = reqwest::Client::new();
        Ok(Self {
            graphql: GraphqlClient::with_client(client.clone(), backend.graphql_url()),
            events: EventStreamClient::with_client(client, backend.stream_url())
                .with_prompt_param(&backend.prompt_param),
        })
    }

    pub fn graphql(&self) -> &GraphqlClient {
        &self.graphql
    }

    pub fn events(&self) -> &EventStreamClient {
        &self.events
    }
}

#[async_trait::async_trait]
impl SearchBackend for HttpBackend {
    async fn ask(&self, query: &SearchQuery) -> Result<Reply, DocentError> {
        self.graphql.ask(query).await
    }

    async fn subscribe(&self, query: &SearchQuery) -> Result<FrameStream, DocentError> {
        self.events.subscribe(query).await
    }
}
