//! Incremental server-sent events decoding
//!
//! SSE format:
//! ```text
//! data: {"json": "content"}
//!
//! : comment lines are ignored
//! data: [DONE]
//! ```
//!
//! Bytes are buffered until a full line is available, so multi-byte UTF-8
//! sequences split across network chunks decode correctly.

use thiserror::Error;

/// Longest line accepted before the stream is treated as broken
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Represents a parsed SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Data event containing the payload
    Data(String),
    /// Terminal [DONE] marker
    Done,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SseError {
    #[error("SSE line exceeds {limit} bytes without a newline")]
    LineTooLong { limit: usize },
}

/// Line-oriented SSE decoder fed with arbitrary byte chunks
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to hold no newline
    scanned: usize,
    max_line: usize,
    data: Vec<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line,
            data: Vec::new(),
        }
    }

    /// Feed a chunk and return every event it completed
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, SseError> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            let line = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
            self.process_line(line.trim_end_matches('\r'), &mut events);
            start = end + 1;
            self.scanned = start;
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line {
            self.buffer.clear();
            self.scanned = 0;
            return Err(SseError::LineTooLong {
                limit: self.max_line,
            });
        }
        Ok(events)
    }

    /// Flush whatever is left once the byte stream ends
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.scanned = 0;
            let line = String::from_utf8_lossy(&rest);
            self.process_line(line.trim_end_matches(['\n', '\r']), &mut events);
        }
        self.flush_data(&mut events);
        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            self.flush_data(events);
            return;
        }

        if line.starts_with(':') {
            return;
        }

        if let Some(data) = line.strip_prefix("data:") {
            let data = data.strip_prefix(' ').unwrap_or(data);
            if data == "[DONE]" {
                self.flush_data(events);
                events.push(SseEvent::Done);
            } else {
                self.data.push(data.to_string());
            }
        }
    }

    fn flush_data(&mut self, events: &mut Vec<SseEvent>) {
        if !self.data.is_empty() {
            events.push(SseEvent::Data(self.data.join("\n")));
            self.data.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<SseEvent> {
        let mut decoder = SseDecoder::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(decoder.push(chunk).unwrap());
        }
        events.extend(decoder.finish());
        events
    }

    #[test]
    fn test_decode_basic() {
        let raw = b"data: {\"text\":\"Hello\"}\n\ndata: {\"text\":\" world\"}\n\ndata: [DONE]\n\n";

        let events = decode_all(&[raw]);

        assert_eq!(
            events,
            vec![
                SseEvent::Data(r#"{"text":"Hello"}"#.to_string()),
                SseEvent::Data(r#"{"text":" world"}"#.to_string()),
                SseEvent::Done,
            ]
        );
    }

    #[test]
    fn test_decode_event_split_across_chunks() {
        let events = decode_all(&[b"da", b"ta: {\"a\"", b":1}\n", b"\n"]);
        assert_eq!(events, vec![SseEvent::Data(r#"{"a":1}"#.to_string())]);
    }

    #[test]
    fn test_decode_multibyte_split_across_chunks() {
        let raw = "data: héllo 👋\n\n".as_bytes();
        // Split inside the four-byte emoji.
        let split = raw.len() - 4;
        let events = decode_all(&[&raw[..split], &raw[split..]]);
        assert_eq!(events, vec![SseEvent::Data("héllo 👋".to_string())]);
    }

    #[test]
    fn test_decode_crlf_and_comments() {
        let raw = b": OPENROUTER PROCESSING\r\n\r\ndata: one\r\n\r\n";
        assert_eq!(decode_all(&[raw]), vec![SseEvent::Data("one".to_string())]);
    }

    #[test]
    fn test_decode_multiline_data() {
        let raw = b"data: line1\ndata: line2\n\n";
        assert_eq!(
            decode_all(&[raw]),
            vec![SseEvent::Data("line1\nline2".to_string())]
        );
    }

    #[test]
    fn test_decode_ignores_other_fields() {
        let raw = b"event: message\nid: 7\nretry: 100\ndata: x\n\n";
        assert_eq!(decode_all(&[raw]), vec![SseEvent::Data("x".to_string())]);
    }

    #[test]
    fn test_decode_without_space_after_colon() {
        assert_eq!(
            decode_all(&[b"data:tight\n\n"]),
            vec![SseEvent::Data("tight".to_string())]
        );
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        assert_eq!(
            decode_all(&[b"data: tail"]),
            vec![SseEvent::Data("tail".to_string())]
        );
    }

    #[test]
    fn test_push_returns_nothing_for_partial_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: partial").unwrap().is_empty());
        assert!(decoder.push(b"\n").unwrap().is_empty());
        assert_eq!(
            decoder.push(b"\n").unwrap(),
            vec![SseEvent::Data("partial".to_string())]
        );
    }

    #[test]
    fn test_many_lines_in_one_chunk() {
        let raw: String = (0..500).map(|i| format!("data: {i}\n\n")).collect();
        let events = decode_all(&[raw.as_bytes()]);
        assert_eq!(events.len(), 500);
        assert_eq!(events[499], SseEvent::Data("499".to_string()));
    }

    #[test]
    fn test_long_line_within_limit_across_chunks() {
        let mut decoder = SseDecoder::with_max_line(64);
        assert!(decoder.push(b"data: ").unwrap().is_empty());
        for _ in 0..5 {
            assert!(decoder.push(b"xxxxxxxxxx").unwrap().is_empty());
        }
        let events = decoder.push(b"\n\n").unwrap();
        assert_eq!(events, vec![SseEvent::Data("x".repeat(50))]);
    }

    #[test]
    fn test_unterminated_line_over_limit_is_error() {
        let mut decoder = SseDecoder::with_max_line(16);
        assert!(decoder.push(b"data: 0123456789").unwrap().is_empty());
        let err = decoder.push(b"abcdef").unwrap_err();
        assert_eq!(err, SseError::LineTooLong { limit: 16 });
        assert!(err.to_string().contains("16 bytes"));
    }
}
