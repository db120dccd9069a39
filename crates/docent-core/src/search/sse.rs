//! Incremental decoder for `text/event-stream` bodies.

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Decodes server-sent events from arbitrarily split byte chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
    id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&line[..line_end]);
            let line = line.strip_suffix('\r').unwrap_or(&line[..]);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// End of body. An event not terminated by a blank line is incomplete
    /// and is discarded, along with any partial line.
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() || !self.data.is_empty() {
            tracing::debug!(
                pending_lines = self.data.len(),
                "Discarding unterminated event at end of stream"
            );
        }
        self.buffer.clear();
        self.data.clear();
        self.event = None;
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        Some(SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"message\": \"hi\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"message\": \"hi\"}");
        assert!(events[0].event.is_none());
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"da").is_empty());
        assert!(decoder.push(b"ta: {\"refor").is_empty());
        assert!(decoder.push(b"mulated\": \"x\"}\r\n").is_empty());
        let events = decoder.push(b"\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"reformulated\": \"x\"}");
    }

    #[test]
    fn test_multiline_data_and_fields() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(
            b": keep-alive\nevent: update\nid: 7\ndata: first\ndata:second\n\ndata: third\n\n",
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event.as_deref(), Some("update"));
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[0].data, "first\nsecond");
        assert!(events[1].event.is_none());
        assert_eq!(events[1].id.as_deref(), Some("7"));
        assert_eq!(events[1].data, "third");
    }

    #[test]
    fn test_blank_lines_without_data_dispatch_nothing() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: ping\n\n\n").is_empty());
    }

    #[test]
    fn test_multibyte_character_split() {
        let mut decoder = SseDecoder::new();
        let text = "data: café\n\n".as_bytes();
        let split = text.iter().position(|&b| b == 0xC3).unwrap() + 1;
        assert!(decoder.push(&text[..split]).is_empty());
        let events = decoder.push(&text[split..]);
        assert_eq!(events[0].data, "café");
    }

    #[test]
    fn test_finish_discards_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"message\": \"done\"}").is_empty());
        decoder.finish();

        // Nothing from the cut-off event leaks into a later one.
        let events = decoder.push(b"data: next\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "next");
    }

    #[test]
    fn test_finish_discards_event_missing_blank_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: message\ndata: partial\n").is_empty());
        decoder.finish();
        let events = decoder.push(b"data: fresh\n\n");
        assert_eq!(events[0].data, "fresh");
        assert!(events[0].event.is_none());
    }
}
