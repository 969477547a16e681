//! Protocol message value types

use crate::error::{LinkError, Result};
use std::fmt;
use std::str::FromStr;

/// Whether a message initiates an exchange or answers one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
}

impl MessageKind {
    /// Canonical wire spelling
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Request => "Request",
            MessageKind::Response => "Response",
        }
    }
}

impl FromStr for MessageKind {
    type Err = LinkError;

    // Wire parsing is case-insensitive
    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("request") {
            Ok(MessageKind::Request)
        } else if s.eq_ignore_ascii_case("response") {
            Ok(MessageKind::Response)
        } else {
            Err(LinkError::Decode(format!("invalid message kind: {s}")))
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome carried by a response (requests always carry `Ok`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Ok,
    RequestNotSupported,
    InvalidRequestBody,
}

impl MessageStatus {
    /// Canonical wire spelling
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Ok => "Ok",
            MessageStatus::RequestNotSupported => "RequestNotSupported",
            MessageStatus::InvalidRequestBody => "InvalidRequestBody",
        }
    }
}

impl FromStr for MessageStatus {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("ok") {
            Ok(MessageStatus::Ok)
        } else if s.eq_ignore_ascii_case("requestnotsupported") {
            Ok(MessageStatus::RequestNotSupported)
        } else if s.eq_ignore_ascii_case("invalidrequestbody") {
            Ok(MessageStatus::InvalidRequestBody)
        } else {
            Err(LinkError::Decode(format!("invalid message status: {s}")))
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status and body of a message
///
/// The body is free-form text, typically a serialized JSON document, and may
/// span multiple lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent {
    pub status: MessageStatus,
    pub body: String,
}

impl MessageContent {
    pub fn new(status: MessageStatus, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// One complete protocol unit
///
/// The `id` is a method name that doubles as the request/response correlation
/// key: the protocol carries no per-call nonce, so concurrent requests sharing
/// an id are resolved strictly in send order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub id: String,
    pub content: MessageContent,
}

impl Message {
    pub fn request(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Request,
            id: id.into(),
            content: MessageContent::new(MessageStatus::Ok, body),
        }
    }

    pub fn response(id: impl Into<String>, content: MessageContent) -> Self {
        Self {
            kind: MessageKind::Response,
            id: id.into(),
            content,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_case_insensitive() {
        assert_eq!("request".parse::<MessageKind>().unwrap(), MessageKind::Request);
        assert_eq!("RESPONSE".parse::<MessageKind>().unwrap(), MessageKind::Response);
        assert!("reqest".parse::<MessageKind>().is_err());
    }

    #[test]
    fn test_status_parse_case_insensitive() {
        assert_eq!("ok".parse::<MessageStatus>().unwrap(), MessageStatus::Ok);
        assert_eq!(
            "requestNotSupported".parse::<MessageStatus>().unwrap(),
            MessageStatus::RequestNotSupported
        );
        assert_eq!(
            "INVALIDREQUESTBODY".parse::<MessageStatus>().unwrap(),
            MessageStatus::InvalidRequestBody
        );
        assert!("NotOk".parse::<MessageStatus>().is_err());
    }

    #[test]
    fn test_display_round_trips_canonical_spelling() {
        for status in [
            MessageStatus::Ok,
            MessageStatus::RequestNotSupported,
            MessageStatus::InvalidRequestBody,
        ] {
            assert_eq!(status.to_string().parse::<MessageStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_message_display() {
        let msg = Message::request("Ping", "{}");
        assert_eq!(msg.to_string(), "Request | Ping");
    }
}
