//! loadpair wire format.
//!
//! Plain ASCII over TCP, one message per connection, no framing. The message
//! boundary is a single read of at most [`MAX_MESSAGE_BYTES`].
//!
//!   handshake request   "DISCOVER <listen_port>"
//!   handshake response  "PEER_RESPONSE"
//!   traffic             any text containing "fast", "dynamic" or "slow"

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of a handshake request. The sender's listen port follows.
pub const DISCOVER_PREFIX: &str = "DISCOVER ";

/// Acknowledgment token returned to the winning DISCOVER.
pub const PEER_RESPONSE: &str = "PEER_RESPONSE";

/// Largest message read from a connection.
pub const MAX_MESSAGE_BYTES: usize = 1024;

// ── Categories ────────────────────────────────────────────────────────────────

/// Traffic class. Each has its own queue counter and generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Fast,
    Dynamic,
    Slow,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Fast, Category::Dynamic, Category::Slow];

    /// Keyword recognised on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Category::Fast => "fast",
            Category::Dynamic => "dynamic",
            Category::Slow => "slow",
        }
    }

    /// Payload the generators send for this category.
    pub fn tag(self) -> &'static str {
        match self {
            Category::Fast => "fast message",
            Category::Dynamic => "dynamic message",
            Category::Slow => "slow message",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("DISCOVER without a port")]
    MissingPort,
    #[error("DISCOVER with invalid port {0:?}")]
    InvalidPort(String),
}

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Handshake request carrying the sender's listen port.
    Discover { port: u16 },
    Traffic(Category),
    Unrecognized,
}

impl Inbound {
    /// Classify one inbound message.
    ///
    /// Traffic keywords are matched anywhere in the text, in the order
    /// fast, dynamic, slow.
    pub fn parse(message: &str) -> Result<Self, WireError> {
        if let Some(rest) = message.strip_prefix(DISCOVER_PREFIX) {
            let port = rest.split_whitespace().next().ok_or(WireError::MissingPort)?;
            return port
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .map(|port| Inbound::Discover { port })
                .ok_or_else(|| WireError::InvalidPort(port.to_string()));
        }

        Ok(Category::ALL
            .into_iter()
            .find(|c| message.contains(c.name()))
            .map(Inbound::Traffic)
            .unwrap_or(Inbound::Unrecognized))
    }
}

/// Encode a handshake request.
pub fn discover(listen_port: u16) -> String {
    format!("{DISCOVER_PREFIX}{listen_port}")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_parses_port() {
        assert_eq!(Inbound::parse(&discover(50512)), Ok(Inbound::Discover { port: 50512 }));
        assert_eq!(
            Inbound::parse("DISCOVER 50512\n"),
            Ok(Inbound::Discover { port: 50512 })
        );
    }

    #[test]
    fn discover_rejects_bad_ports() {
        assert_eq!(Inbound::parse("DISCOVER "), Err(WireError::MissingPort));
        assert_eq!(
            Inbound::parse("DISCOVER abc"),
            Err(WireError::InvalidPort("abc".into()))
        );
        assert_eq!(
            Inbound::parse("DISCOVER 70000"),
            Err(WireError::InvalidPort("70000".into()))
        );
        assert_eq!(Inbound::parse("DISCOVER 0"), Err(WireError::InvalidPort("0".into())));
    }

    #[test]
    fn discover_needs_exact_prefix() {
        // no separator after the keyword: not a handshake, and no category either
        assert_eq!(Inbound::parse("DISCOVER"), Ok(Inbound::Unrecognized));
    }

    #[test]
    fn generator_tags_classify_to_their_category() {
        for c in Category::ALL {
            assert_eq!(Inbound::parse(c.tag()), Ok(Inbound::Traffic(c)));
        }
    }

    #[test]
    fn first_keyword_in_match_order_wins() {
        assert_eq!(
            Inbound::parse("slow then fast"),
            Ok(Inbound::Traffic(Category::Fast))
        );
        assert_eq!(
            Inbound::parse("slowdynamic"),
            Ok(Inbound::Traffic(Category::Dynamic))
        );
    }

    #[test]
    fn unknown_text_is_unrecognized() {
        assert_eq!(Inbound::parse("hello"), Ok(Inbound::Unrecognized));
        assert_eq!(Inbound::parse(""), Ok(Inbound::Unrecognized));
        assert_eq!(Inbound::parse(PEER_RESPONSE), Ok(Inbound::Unrecognized));
    }

    #[test]
    fn category_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Category::Dynamic).unwrap(), "\"dynamic\"");
    }
}
