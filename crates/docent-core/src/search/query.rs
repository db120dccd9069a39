use crate::session::{ConversationHistory, Filters};
use serde::Serialize;

/// Everything the backend needs to answer one question. Serializes to the
/// GraphQL variable names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub prompt: String,
    pub convo_history: String,
    pub role_filter: String,
    pub content_type: String,
    pub resource_type: String,
}

impl SearchQuery {
    pub fn new(prompt: impl Into<String>, history: &ConversationHistory, filters: &Filters) -> Self {
        Self {
            prompt: prompt.into(),
            convo_history: history.format(),
            role_filter: filters.role_filter.clone(),
            content_type: filters.content_type.clone(),
            resource_type: filters.resource_type.clone(),
        }
    }

    /// Percent-encoded query string for the streaming endpoint. The question
    /// itself is sent under `prompt_param` (`prompt` or `query`).
    pub fn to_query_string(&self, prompt_param: &str) -> String {
        [
            (prompt_param, &self.prompt),
            ("convoHistory", &self.convo_history),
            ("roleFilter", &self.role_filter),
            ("contentType", &self.content_type),
            ("resourceType", &self.resource_type),
        ]
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
    }
}
