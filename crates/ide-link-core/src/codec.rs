//! Framed message codec for the line-oriented wire format
//!
//! Each message is framed as:
//!
//! ```text
//! <Kind>            Request | Response
//! <Id>              free-form method name
//! <Status>          Ok | RequestNotSupported | InvalidRequestBody
//! <BodyLineCount>   non-negative integer N
//! <N body lines>
//! ```
//!
//! Lines are `\n`-terminated on the wire; the line transport is expected to
//! strip the terminator (and any trailing `\r`) before handing lines to the
//! decoder.

use crate::error::{LinkError, Result};
use crate::message::{Message, MessageContent, MessageKind, MessageStatus};

/// Encode a message into its framed wire form, ready for a single write+flush.
///
/// The body-line count is the number of embedded line breaks plus one, so a
/// body with no breaks still occupies one line and a multi-line body survives
/// the line-oriented framing intact.
pub fn encode(message: &Message) -> String {
    let body = &message.content.body;
    let body_line_count = body.matches('\n').count() + 1;

    let mut out = String::with_capacity(body.len() + 64);
    out.push_str(message.kind.as_str());
    out.push('\n');
    out.push_str(&message.id);
    out.push('\n');
    out.push_str(message.content.status.as_str());
    out.push('\n');
    out.push_str(&body_line_count.to_string());
    out.push('\n');
    out.push_str(body);
    out.push('\n');
    out
}

/// Which frame line the decoder expects next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Kind,
    Id,
    Status,
    BodyLineCount,
    Body,
}

/// Incremental decoder for framed messages
///
/// Fed one line at a time; yields a complete [`Message`] once the declared
/// number of body lines has been consumed, then resets for the next message.
/// A malformed kind, status, or count line discards the partial message and
/// resets the decoder; the error is reported to the caller but never needs to
/// terminate the connection.
#[derive(Debug)]
pub struct MessageDecoder {
    stage: Stage,
    kind: Option<MessageKind>,
    id: Option<String>,
    status: Option<MessageStatus>,
    pending_body_lines: usize,
    body_lines_read: usize,
    body: String,
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self {
            stage: Stage::Kind,
            kind: None,
            id: None,
            status: None,
            pending_body_lines: 0,
            body_lines_read: 0,
            body: String::new(),
        }
    }

    fn reset(&mut self) {
        self.stage = Stage::Kind;
        self.kind = None;
        self.id = None;
        self.status = None;
        self.pending_body_lines = 0;
        self.body_lines_read = 0;
        self.body.clear();
    }

    /// Consume one line (without its terminator).
    ///
    /// Returns `Ok(None)` while mid-message, `Ok(Some(message))` when the line
    /// completes a frame, and `Err` when the line is malformed for the current
    /// stage (the partial message is discarded).
    pub fn decode(&mut self, line: &str) -> Result<Option<Message>> {
        match self.stage {
            Stage::Kind => {
                let kind = line.parse::<MessageKind>().inspect_err(|_| self.reset())?;
                self.kind = Some(kind);
                self.stage = Stage::Id;
                Ok(None)
            }
            Stage::Id => {
                self.id = Some(line.to_owned());
                self.stage = Stage::Status;
                Ok(None)
            }
            Stage::Status => {
                let status = line.parse::<MessageStatus>().inspect_err(|_| self.reset())?;
                self.status = Some(status);
                self.stage = Stage::BodyLineCount;
                Ok(None)
            }
            Stage::BodyLineCount => {
                // The count is peer-controlled; anything but a non-negative
                // integer is a framing error.
                let count = line.parse::<usize>().map_err(|_| {
                    self.reset();
                    LinkError::Decode(format!("invalid body line count: {line}"))
                })?;
                self.pending_body_lines = count;
                self.stage = Stage::Body;
                if count == 0 {
                    return Ok(Some(self.finish()));
                }
                Ok(None)
            }
            Stage::Body => {
                // Body lines, blank ones included, are taken verbatim; the
                // terminator is re-inserted between lines so the decoded body
                // matches the encoded one exactly.
                if self.body_lines_read > 0 {
                    self.body.push('\n');
                }
                self.body.push_str(line);
                self.body_lines_read += 1;
                self.pending_body_lines -= 1;
                if self.pending_body_lines == 0 {
                    return Ok(Some(self.finish()));
                }
                Ok(None)
            }
        }
    }

    fn finish(&mut self) -> Message {
        let message = Message {
            kind: self.kind.take().unwrap_or(MessageKind::Request),
            id: self.id.take().unwrap_or_default(),
            content: MessageContent {
                status: self.status.take().unwrap_or(MessageStatus::Ok),
                body: std::mem::take(&mut self.body),
            },
        };
        self.reset();
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed encoded text to a decoder line by line, collecting every message
    /// it yields. Malformed lines are skipped the way a connection would.
    fn decode_all(decoder: &mut MessageDecoder, text: &str) -> Vec<Message> {
        let mut out = Vec::new();
        for line in text.split_terminator('\n') {
            match decoder.decode(line) {
                Ok(Some(msg)) => out.push(msg),
                Ok(None) => {}
                Err(_) => {}
            }
        }
        out
    }

    #[test]
    fn test_round_trip_single_line_body() {
        let msg = Message::request("Ping", "{}");
        let mut decoder = MessageDecoder::new();
        let decoded = decode_all(&mut decoder, &encode(&msg));
        assert_eq!(decoded, vec![msg]);
    }

    #[test]
    fn test_round_trip_multi_line_body() {
        let msg = Message::response(
            "CodeCompletion",
            MessageContent::new(MessageStatus::Ok, "{\n  \"Suggestions\": [\n\n  ]\n}"),
        );
        let mut decoder = MessageDecoder::new();
        let decoded = decode_all(&mut decoder, &encode(&msg));
        assert_eq!(decoded, vec![msg]);
    }

    #[test]
    fn test_round_trip_empty_body() {
        let msg = Message::request("Ping", "");
        assert!(encode(&msg).ends_with("1\n\n"));
        let mut decoder = MessageDecoder::new();
        let decoded = decode_all(&mut decoder, &encode(&msg));
        assert_eq!(decoded, vec![msg]);
    }

    #[test]
    fn test_decoder_reuse_no_state_leakage() {
        let first = Message::request("Ping", "{}");
        let second = Message::request("Ping", "{\"n\":2}");
        let mut decoder = MessageDecoder::new();
        let mut wire = encode(&first);
        wire.push_str(&encode(&second));
        let decoded = decode_all(&mut decoder, &wire);
        assert_eq!(decoded, vec![first, second]);
    }

    #[test]
    fn test_bad_status_line_resets_decoder() {
        let good = Message::request("Ping", "{}");
        let mut wire = String::from("Request\nPing\nNotAStatus\n");
        wire.push_str(&encode(&good));

        let mut decoder = MessageDecoder::new();
        let mut decoded = Vec::new();
        let mut errors = 0;
        for line in wire.split_terminator('\n') {
            match decoder.decode(line) {
                Ok(Some(msg)) => decoded.push(msg),
                Ok(None) => {}
                Err(LinkError::Decode(_)) => errors += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(errors, 1);
        assert_eq!(decoded, vec![good]);
    }

    #[test]
    fn test_bad_kind_line_is_decode_error() {
        let mut decoder = MessageDecoder::new();
        assert!(matches!(decoder.decode("Banana"), Err(LinkError::Decode(_))));
        // Decoder is usable again immediately
        assert!(decoder.decode("Request").unwrap().is_none());
    }

    #[test]
    fn test_body_line_count_rejects_negative_and_garbage() {
        for bad in ["-1", "three", "1.5", ""] {
            let mut decoder = MessageDecoder::new();
            decoder.decode("Request").unwrap();
            decoder.decode("Ping").unwrap();
            decoder.decode("Ok").unwrap();
            assert!(
                matches!(decoder.decode(bad), Err(LinkError::Decode(_))),
                "count {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_kind_and_status_case_insensitive_on_wire() {
        let mut decoder = MessageDecoder::new();
        let wire = "rEqUeSt\nPing\nOK\n1\n{}\n";
        let decoded = decode_all(&mut decoder, wire);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].kind, MessageKind::Request);
        assert_eq!(decoded[0].content.status, MessageStatus::Ok);
    }

    #[test]
    fn test_blank_body_lines_survive() {
        let msg = Message::request("Notify", "first\n\nthird");
        let mut decoder = MessageDecoder::new();
        let decoded = decode_all(&mut decoder, &encode(&msg));
        assert_eq!(decoded, vec![msg]);
    }
}
