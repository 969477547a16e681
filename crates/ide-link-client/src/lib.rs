//! # ide-link-client
//!
//! IDE-side session management for the editor messaging link.
//!
//! A [`Session`] discovers a running editor through its metadata file,
//! connects to it over TCP, and keeps the connection alive across editor
//! restarts by watching the file for changes. Incoming requests are routed to
//! a [`MessageHandler`] supplied by the embedding application; outgoing
//! requests go through [`Session::send_request`] (or [`Peer::send_request`]
//! when holding a peer directly).

pub mod handler;
pub mod peer;
pub mod session;
pub mod watcher;

#[cfg(test)]
mod test_support;

pub use handler::{MessageHandler, RequestRegistry};
pub use peer::Peer;
pub use session::{Session, SessionConfig};
pub use watcher::{MetaFileEvent, MetaFileWatcher};
