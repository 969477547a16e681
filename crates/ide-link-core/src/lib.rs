//! # ide-link-core
//!
//! Core types and wire protocol for the editor IDE messaging link.
//!
//! This crate provides the pieces shared by both ends of a connection:
//! - Message value types (kind, id, status, body)
//! - The line-oriented framed message codec
//! - The version/identity handshake negotiator
//! - Connection metadata parsing (the discovery file written by the editor)

pub mod codec;
pub mod error;
pub mod handshake;
pub mod message;
pub mod metadata;

pub use codec::{MessageDecoder, encode};
pub use error::{LinkError, Result};
pub use handshake::{
    CLIENT_HANDSHAKE_NAME, ClientHandshake, PROTOCOL_VERSION_MAJOR, PROTOCOL_VERSION_MINOR,
    PROTOCOL_VERSION_REVISION, SERVER_HANDSHAKE_NAME,
};
pub use message::{Message, MessageContent, MessageKind, MessageStatus};
pub use metadata::{ConnectionMetadata, META_FILE_NAME, metadata_dir};
