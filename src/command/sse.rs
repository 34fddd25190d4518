//! Incremental Server-Sent-Events line parser, adapted from the vendor
//! streaming-LLM parser this crate's `sse-request` executor (spec §4.12)
//! needs to decode a chat-completion stream without inventing ad hoc
//! framing.

/// One parsed SSE event: `data:` field(s) joined by newline, plus optional
/// `event:`/`id:` fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub event_type: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

#[derive(Debug, Default)]
struct EventBuilder {
    event_type: Option<String>,
    data_lines: Vec<String>,
    id: Option<String>,
}

impl EventBuilder {
    fn has_data(&self) -> bool {
        !self.data_lines.is_empty()
    }

    fn build(&mut self) -> SseEvent {
        let event = SseEvent {
            event_type: self.event_type.take(),
            data: self.data_lines.join("\n"),
            id: self.id.take(),
        };
        self.data_lines.clear();
        event
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.has_data().then(|| self.build());
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some((field, value)) = parse_field(line) {
            match field {
                "data" => self.data_lines.push(value.to_string()),
                "event" => self.event_type = Some(value.to_string()),
                "id" => self.id = Some(value.to_string()),
                _ => {}
            }
        }
        None
    }
}

fn parse_field(line: &str) -> Option<(&str, &str)> {
    let colon_pos = line.find(':')?;
    let field = &line[..colon_pos];
    let mut value = &line[colon_pos + 1..];
    if let Some(stripped) = value.strip_prefix(' ') {
        value = stripped;
    }
    Some((field, value))
}

/// Incrementally parse SSE bytes into events as a stream of chunks arrives.
#[derive(Debug, Default)]
pub struct SseLineParser {
    line_buffer: String,
    builder: EventBuilder,
}

impl SseLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let text = String::from_utf8_lossy(chunk);
        let mut events = Vec::new();
        for ch in text.chars() {
            if ch == '\n' {
                let line = std::mem::take(&mut self.line_buffer);
                let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
                if let Some(event) = self.builder.process_line(&line) {
                    events.push(event);
                }
            } else {
                self.line_buffer.push(ch);
            }
        }
        events
    }

    pub fn flush(&mut self) -> Option<SseEvent> {
        if !self.line_buffer.is_empty() {
            let line = std::mem::take(&mut self.line_buffer);
            let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
            self.builder.process_line(&line);
        }
        self.builder.has_data().then(|| self.builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_data_event() {
        let mut parser = SseLineParser::new();
        let events = parser.push(b"data: hello\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn splits_events_across_pushes() {
        let mut parser = SseLineParser::new();
        assert!(parser.push(b"data: he").is_empty());
        let events = parser.push(b"llo\n\n");
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn recognizes_the_done_sentinel() {
        let mut parser = SseLineParser::new();
        let events = parser.push(b"data: [DONE]\n\n");
        assert!(events[0].is_done());
    }

    #[test]
    fn multi_line_data_fields_join_with_newline() {
        let mut parser = SseLineParser::new();
        let events = parser.push(b"data: line one\ndata: line two\n\n");
        assert_eq!(events[0].data, "line one\nline two");
    }
}
