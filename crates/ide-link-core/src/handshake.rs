//! Version/identity handshake negotiator
//!
//! Each side of a connection sends exactly one handshake line before any
//! framed traffic:
//!
//! ```text
//! {HandshakeName},Version={major}.{minor}.{revision},{identity}
//! ```
//!
//! The name differs by role so a client can never mistake another client for
//! an editor. Compatibility: major versions must match exactly, the peer's
//! minor version must not be ahead of ours, and the revision is parsed but
//! never compared.

use crate::error::{LinkError, Result};
use regex::Regex;

pub const PROTOCOL_VERSION_MAJOR: u32 = 1;
pub const PROTOCOL_VERSION_MINOR: u32 = 1;
pub const PROTOCOL_VERSION_REVISION: u32 = 0;

/// Handshake name sent by the IDE side (the initiator)
pub const CLIENT_HANDSHAKE_NAME: &str = "GodotIdeClient";
/// Handshake name expected from the editor side (the acceptor)
pub const SERVER_HANDSHAKE_NAME: &str = "GodotIdeServer";

/// Identities are identifier-like: leading letter or underscore, at most 64
/// characters total.
const IDENTITY_PATTERN: &str = "([A-Za-z_][A-Za-z0-9_]{0,63})";

/// Client-side handshake negotiator: produces our handshake line and
/// validates the editor's.
#[derive(Debug)]
pub struct ClientHandshake {
    line_base: String,
    peer_pattern: Regex,
}

impl Default for ClientHandshake {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientHandshake {
    pub fn new() -> Self {
        let line_base = format!(
            "{CLIENT_HANDSHAKE_NAME},Version={PROTOCOL_VERSION_MAJOR}.{PROTOCOL_VERSION_MINOR}.{PROTOCOL_VERSION_REVISION}"
        );
        let pattern = format!(
            "{},Version=([0-9]+)\\.([0-9]+)\\.([0-9]+),{}",
            regex::escape(SERVER_HANDSHAKE_NAME),
            IDENTITY_PATTERN
        );
        Self {
            line_base,
            // The pattern is built from constants; it cannot fail to compile.
            peer_pattern: Regex::new(&pattern).unwrap(),
        }
    }

    /// The single line we send to the editor, carrying our identity.
    pub fn handshake_line(&self, identity: &str) -> String {
        format!("{},{}", self.line_base, identity)
    }

    /// Validate the editor's handshake line, returning its identity.
    pub fn validate_peer_line(&self, line: &str) -> Result<String> {
        let captures = self
            .peer_pattern
            .captures(line)
            .ok_or_else(|| LinkError::Handshake(format!("malformed peer handshake: {line}")))?;

        let major: u32 = captures[1]
            .parse()
            .map_err(|_| LinkError::Handshake(format!("bad major version: {}", &captures[1])))?;
        if major != PROTOCOL_VERSION_MAJOR {
            return Err(LinkError::Handshake(format!(
                "incompatible major version: {major}"
            )));
        }

        let minor: u32 = captures[2]
            .parse()
            .map_err(|_| LinkError::Handshake(format!("bad minor version: {}", &captures[2])))?;
        // A peer with an older minor is fine; one ahead of us is not.
        if minor > PROTOCOL_VERSION_MINOR {
            return Err(LinkError::Handshake(format!(
                "incompatible minor version: {minor}"
            )));
        }

        let _revision: u32 = captures[3]
            .parse()
            .map_err(|_| LinkError::Handshake(format!("bad revision: {}", &captures[3])))?;

        Ok(captures[4].to_owned())
    }
}
