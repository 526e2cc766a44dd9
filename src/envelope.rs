//! Envelope — the message unit exchanged over the fan-out hub.
//!
//! DESIGN
//! ======
//! Inbound text frames decode to a `ClientMessage` (`{type, payload}`). The
//! hub wraps every message in an `Envelope` that stamps the sender identity,
//! and that envelope is what every connected peer receives:
//! `{id, message: {type, payload}}`.
//!
//! Two flavors exist: user-originated (decoded from a reader task) and
//! synthetic `join`/`leave` notifications emitted by the hub itself with a
//! null payload. Envelopes are immutable once constructed.

use serde::{Deserialize, Serialize};

// =============================================================================
// TYPES
// =============================================================================

/// A message as sent by a client: a type tag plus an arbitrary JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub kind: String,
    /// Absent payloads decode to JSON null.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// The broadcast unit: sender identity plus the message it sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Caller-supplied identity of the originating client. Trusted as-is.
    pub id: String,
    pub message: ClientMessage,
}

impl Envelope {
    /// Wrap a decoded client message with its sender identity.
    #[must_use]
    pub fn user(id: impl Into<String>, message: ClientMessage) -> Self {
        Self { id: id.into(), message }
    }

    /// Synthetic notification broadcast when a client registers.
    #[must_use]
    pub fn join(id: impl Into<String>) -> Self {
        Self::system(id, "join")
    }

    /// Synthetic notification broadcast when a client unregisters.
    #[must_use]
    pub fn leave(id: impl Into<String>) -> Self {
        Self::system(id, "leave")
    }

    fn system(id: impl Into<String>, kind: &str) -> Self {
        Self {
            id: id.into(),
            message: ClientMessage { kind: kind.to_string(), payload: serde_json::Value::Null },
        }
    }
}

// =============================================================================
// DECODE
// =============================================================================

/// Normalize and decode one inbound text frame.
///
/// Surrounding whitespace is trimmed and embedded line separators are
/// collapsed to single spaces before parsing.
///
/// # Errors
///
/// Returns the JSON error for a malformed frame. Callers drop the frame and
/// keep reading; a bad frame never terminates the connection.
pub fn decode_client_message(raw: &str) -> Result<ClientMessage, serde_json::Error> {
    let normalized: String = raw
        .trim()
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    serde_json::from_str(&normalized)
}

#[cfg(test)]
#[path = "envelope_test.rs"]
mod tests;
