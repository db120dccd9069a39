use crate::error::DocentError;
use crate::search::query::SearchQuery;
use crate::search::sse::SseDecoder;
use crate::search::traits::{FrameStream, StreamFrame};
use futures::stream::{self, StreamExt};
use reqwest::header::ACCEPT;

/// Streaming transport: a GET subscription answered with `text/event-stream`.
#[derive(Clone)]
pub struct EventStreamClient {
    client: reqwest::Client,
    endpoint: String,
    prompt_param: String,
}

impl EventStreamClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            prompt_param: "prompt".to_string(),
        }
    }

    /// Name of the query parameter carrying the question (`prompt` or `query`).
    pub fn with_prompt_param(mut self, param: impl Into<String>) -> Self {
        self.prompt_param = param.into();
        self
    }

    pub fn request_url(&self, query: &SearchQuery) -> String {
        format!("{}?{}", self.endpoint, query.to_query_string(&self.prompt_param))
    }

    /// Connect and return the frame stream. The first frame is always
    /// `Open` with the response status; a non-2xx response yields nothing
    /// after it. A healthy body ends with `Closed`, a broken one with `Error`.
    pub async fn subscribe(&self, query: &SearchQuery) -> Result<FrameStream, DocentError> {
        let url = self.request_url(query);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "Event stream connection made");
        let open = stream::once(async move {
            StreamFrame::Open {
                status: status.as_u16(),
            }
        });

        if !status.is_success() {
            return Ok(open.boxed());
        }

        let body = Box::pin(response.bytes_stream());
        let frames = stream::unfold(Some((body, SseDecoder::new())), |state| async move {
            let (mut body, mut decoder) = state?;
            loop {
                match body.next().await {
                    Some(Ok(chunk)) => {
                        let events = decoder.push(&chunk);
                        if !events.is_empty() {
                            let frames: Vec<StreamFrame> =
                                events.into_iter().map(StreamFrame::Event).collect();
                            return Some((frames, Some((body, decoder))));
                        }
                    }
                    Some(Err(e)) => {
                        return Some((vec![StreamFrame::Error(e.to_string())], None));
                    }
                    None => {
                        decoder.finish();
                        return Some((vec![StreamFrame::Closed], None));
                    }
                }
            }
        })
        .flat_map(stream::iter);

        Ok(open.chain(frames).boxed())
    }
}
