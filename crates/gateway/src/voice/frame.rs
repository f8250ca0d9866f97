//! Wire frames for the voice transport session.
//!
//! Inbound frames are JSON with an `interaction_type` discriminator;
//! anything unrecognized deserializes to `Other` and is ignored. Outbound
//! frames echo the triggering `response_id` (`0` is reserved for the
//! unsolicited greeting).

use serde::{Deserialize, Serialize};

/// WebSocket close code: policy violation (missing/unknown/inactive tenant).
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// WebSocket close code: unsupported data (non-JSON frame).
pub const CLOSE_UNSUPPORTED_DATA: u16 = 1003;

/// The only `turntaking` value that signals a genuine barge-in.
pub const TURNTAKING_USER_TURN: &str = "user_turn";

/// `response_id` of the unsolicited greeting.
pub const GREETING_RESPONSE_ID: u64 = 0;

/// One transcript entry as pushed by the voice transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// Inbound protocol frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "interaction_type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Transcript-state push. Arrives constantly during normal user
    /// speech; only `turntaking == "user_turn"` during generation is a
    /// barge-in.
    UpdateOnly {
        #[serde(default)]
        turntaking: Option<String>,
    },

    /// The transport requests a spoken reply.
    ResponseRequired {
        response_id: u64,
        #[serde(default)]
        transcript: Vec<TranscriptEntry>,
    },

    /// Ping, call-ended, and anything the transport adds later.
    #[serde(other)]
    Other,
}

/// Outbound streaming frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub response_type: String,
    pub response_id: u64,
    pub content: String,
    pub content_complete: bool,
    /// Reserved; always `false` today (kept for forward compatibility).
    pub end_call: bool,
}

impl OutboundFrame {
    /// A partial content chunk.
    pub fn chunk(response_id: u64, content: impl Into<String>) -> Self {
        Self {
            response_type: "response".into(),
            response_id,
            content: content.into(),
            content_complete: false,
            end_call: false,
        }
    }

    /// The at-most-once final frame of a turn.
    pub fn final_frame(response_id: u64, content: impl Into<String>) -> Self {
        Self {
            response_type: "response".into(),
            response_id,
            content: content.into(),
            content_complete: true,
            end_call: false,
        }
    }
}
