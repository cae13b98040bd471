//! Wire-level event model for the live relay.
//!
//! Every event crossing the SSE boundary is a `LiveEvent`, serialized as
//! `{"type": "...", "data": {...}}` with a lowercase discriminator. Field
//! casing (`userAvatar`, `giftName`) is part of the wire contract consumed
//! by the browser client and must not change.

use serde::Serialize;

/// A chat participant as rendered on the live page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatUser {
    pub name: String,
    pub avatar: String,
}

/// Domain events relayed to SSE clients.
///
/// `Gift` is part of the wire taxonomy for clients that render gift feeds,
/// but the DOM extractor has no confirmed gift selector and never produces
/// one from live data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum LiveEvent {
    Connected {
        message: String,
        #[serde(rename = "userAvatar")]
        user_avatar: String,
    },
    Stats {
        viewers: u64,
        likes: u64,
        shares: u64,
    },
    Comment {
        id: String,
        user: ChatUser,
        comment: String,
    },
    Gift {
        id: String,
        user: ChatUser,
        #[serde(rename = "giftName")]
        gift_name: String,
        amount: u32,
    },
    Error {
        message: String,
    },
}

impl LiveEvent {
    /// Acknowledgment sent once a live page has been opened successfully.
    pub fn connected(target: &str, avatar_url: &str) -> Self {
        LiveEvent::Connected {
            message: format!("Connected to @{}", target),
            user_avatar: avatar_url.to_string(),
        }
    }

    /// The fixed, non-diagnostic message sent for any upstream failure.
    /// Internal detail belongs in the log, never on the wire.
    pub fn stream_error() -> Self {
        LiveEvent::Error {
            message: "User not found or is not live. Please check the username.".to_string(),
        }
    }
}
