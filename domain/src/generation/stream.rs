//! Streaming events for generation calls.
//!
//! [`StreamEvent`] is what a capability hands back chunk by chunk. Adapters
//! without native streaming emit a single `Completed`.

/// One item on a generation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Partial text.
    Delta(String),
    /// Full text; closes the stream.
    Completed(String),
    /// The backend gave up mid-stream.
    Error(String),
}

impl StreamEvent {
    /// Text carried by the event, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamEvent::Delta(text) | StreamEvent::Completed(text) => Some(text),
            StreamEvent::Error(_) => None,
        }
    }

    /// Whether nothing follows this event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed(_) | StreamEvent::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_not_terminal() {
        let event = StreamEvent::Delta("chunk".to_string());
        assert_eq!(event.text(), Some("chunk"));
        assert!(!event.is_terminal());
    }

    #[test]
    fn error_is_terminal_without_text() {
        let event = StreamEvent::Error("backend closed".to_string());
        assert_eq!(event.text(), None);
        assert!(event.is_terminal());
    }
}
