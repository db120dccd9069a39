use crate::error::DocentError;
use crate::search::query::SearchQuery;
use crate::search::traits::Reply;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ASK_LLM_QUERY: &str = r#"
query Search($prompt: String!, $convoHistory: String!, $roleFilter: String!, $contentType: String, $resourceType: String) {
  askLlm(prompt: $prompt, convoHistory: $convoHistory, roleFilter: $roleFilter, contentType: $contentType, resourceType: $resourceType) {
    title
    link
    summary
    citations {
      id
      context
    }
  }
}
"#;

/// Batch transport: one `askLlm` GraphQL query per question.
#[derive(Clone)]
pub struct GraphqlClient {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'static str,
    variables: &'a SearchQuery,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<AskLlmData>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct AskLlmData {
    #[serde(rename = "askLlm")]
    ask_llm: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

impl GraphqlClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn ask(&self, query: &SearchQuery) -> Result<Reply, DocentError> {
        let request_body = GraphQlRequest {
            query: ASK_LLM_QUERY,
            variables: query,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(DocentError::status(status.as_u16(), response_text));
        }

        let payload: GraphQlResponse = serde_json::from_str(&response_text)?;

        if let Some(items) = payload.data.and_then(|d| d.ask_llm) {
            if !payload.errors.is_empty() {
                tracing::warn!(
                    errors = payload.errors.len(),
                    "askLlm returned data alongside GraphQL errors"
                );
            }
            tracing::debug!(items = items.len(), "askLlm reply received");
            return Ok(Reply::from_items(items));
        }

        if payload.errors.is_empty() {
            return Err(DocentError::GraphQl("response carried no askLlm data".into()));
        }
        let messages: Vec<String> = payload.errors.into_iter().map(|e| e.message).collect();
        Err(DocentError::GraphQl(messages.join("; ")))
    }
}
