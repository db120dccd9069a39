use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One past follow-up exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub question: String,
    pub llm_response: String,
}

impl HistoryEntry {
    pub fn new(
        role: impl Into<String>,
        question: impl Into<String>,
        llm_response: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            question: question.into(),
            llm_response: llm_response.into(),
        }
    }

    fn render(&self) -> String {
        format!(
            "Previous {} question: {}\nPrevious Follow Up Question: {}",
            self.role, self.question, self.llm_response
        )
    }
}

/// Short-term dialogue memory sent with every question so the backend can
/// resolve follow-ups. Append-only; unbounded unless a cap is configured.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    entries: VecDeque<HistoryEntry>,
    max_entries: Option<usize>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max` entries, dropping the oldest first.
    pub fn with_max_entries(mut self, max: Option<usize>) -> Self {
        self.max_entries = max;
        self.trim_if_needed();
        self
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        self.trim_if_needed();
    }

    /// Render every entry in insertion order, separated by blank lines.
    pub fn format(&self) -> String {
        self.entries
            .iter()
            .map(HistoryEntry::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    fn trim_if_needed(&mut self) {
        if let Some(max) = self.max_entries {
            while self.entries.len() > max {
                self.entries.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_empty() {
        assert_eq!(ConversationHistory::new().format(), "");
    }

    #[test]
    fn test_format_single_entry() {
        let mut history = ConversationHistory::new();
        history.append(HistoryEntry::new("user", "Q", "A"));
        assert_eq!(
            history.format(),
            "Previous user question: Q\nPrevious Follow Up Question: A"
        );
    }

    #[test]
    fn test_format_joins_with_blank_line_and_is_idempotent() {
        let mut history = ConversationHistory::new();
        history.append(HistoryEntry::new("user", "What is the FOIA deadline?", "Which state?"));
        history.append(HistoryEntry::new("user", "Massachusetts", "State or municipal records?"));

        let expected = "Previous user question: What is the FOIA deadline?\n\
                        Previous Follow Up Question: Which state?\n\n\
                        Previous user question: Massachusetts\n\
                        Previous Follow Up Question: State or municipal records?";
        assert_eq!(history.format(), expected);
        assert_eq!(history.format(), history.format());
    }

    #[test]
    fn test_unbounded_by_default() {
        let mut history = ConversationHistory::new();
        for i in 0..500 {
            history.append(HistoryEntry::new("user", format!("q{i}"), "a"));
        }
        assert_eq!(history.len(), 500);
    }

    #[test]
    fn test_cap_drops_oldest() {
        let mut history = ConversationHistory::new().with_max_entries(Some(2));
        history.append(HistoryEntry::new("user", "q1", "a1"));
        history.append(HistoryEntry::new("user", "q2", "a2"));
        history.append(HistoryEntry::new("user", "q3", "a3"));

        let questions: Vec<&str> = history.entries().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, vec!["q2", "q3"]);
        assert_eq!(history.last().unwrap().llm_response, "a3");
    }
}
