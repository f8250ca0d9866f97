//! Conversation history: the ordered sequence of turns a session sends to
//! the model on every generation call.
//!
//! The history is owned by the session state machine and mutated only under
//! its turn serializer: turns are appended at commit points, and a partial
//! turn is undone by truncating back to a recorded checkpoint length.
//! Existing turns are never edited in place.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a turn. Tool results ride in `user` turns, following the
/// provider's multi-turn function-calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One piece of a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    ToolCall { name: String, args: Value },
    ToolResult { name: String, payload: Value },
}

/// A single `{role, parts}` entry in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text { text: text.into() }],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text { text: text.into() }],
        }
    }

    pub fn model_tool_call(name: impl Into<String>, args: Value) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::ToolCall {
                name: name.into(),
                args,
            }],
        }
    }

    pub fn user_tool_result(name: impl Into<String>, payload: Value) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::ToolResult {
                name: name.into(),
                payload,
            }],
        }
    }

    /// The name of the tool call carried by this turn, if any.
    pub fn tool_call_name(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            Part::ToolCall { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    /// The name of the tool result carried by this turn, if any.
    pub fn tool_result_name(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            Part::ToolResult { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }
}

/// The ordered turn sequence for one session.
///
/// Append-only, except for [`truncate`](Self::truncate) back to a length
/// previously recorded with [`len`](Self::len).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory(Vec<Turn>);

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, turn: Turn) {
        self.0.push(turn);
    }

    /// Roll back to a previously recorded checkpoint length. A checkpoint
    /// greater than the current length is a no-op.
    pub fn truncate(&mut self, checkpoint: usize) {
        self.0.truncate(checkpoint);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.0
    }

    /// Structural validity: empty, or starting with a `user` turn in which
    /// roles alternate except where a tool-call turn bridges directly into
    /// the `user` turn carrying the matching tool result.
    pub fn is_well_formed(&self) -> bool {
        let turns = &self.0;
        if turns.is_empty() {
            return true;
        }
        if turns[0].role != Role::User {
            return false;
        }
        for pair in turns.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if let Some(call) = a.tool_call_name() {
                // A tool call must be answered in the very next turn.
                if b.role != Role::User || b.tool_result_name() != Some(call) {
                    return false;
                }
                continue;
            }
            if a.role == b.role {
                return false;
            }
        }
        // A trailing unanswered tool call is an uncommitted partial turn.
        turns
            .last()
            .map(|t| t.tool_call_name().is_none())
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_history_is_well_formed() {
        assert!(ConversationHistory::new().is_well_formed());
    }

    #[test]
    fn must_start_with_user() {
        let mut h = ConversationHistory::new();
        h.push(Turn::model_text("hello"));
        assert!(!h.is_well_formed());
    }

    #[test]
    fn alternating_text_turns() {
        let mut h = ConversationHistory::new();
        h.push(Turn::user_text("hi"));
        h.push(Turn::model_text("hello"));
        h.push(Turn::user_text("what are your hours?"));
        h.push(Turn::model_text("11am to 10pm"));
        assert!(h.is_well_formed());
    }

    #[test]
    fn consecutive_same_role_rejected() {
        let mut h = ConversationHistory::new();
        h.push(Turn::user_text("hi"));
        h.push(Turn::user_text("hi again"));
        assert!(!h.is_well_formed());
    }

    #[test]
    fn tool_call_bridged_by_matching_result() {
        let mut h = ConversationHistory::new();
        h.push(Turn::user_text("show me the menu"));
        h.push(Turn::model_tool_call("get_menu", json!({})));
        h.push(Turn::user_tool_result("get_menu", json!({"menu": "bulgogi"})));
        h.push(Turn::model_text("we have bulgogi"));
        assert!(h.is_well_formed());
    }

    #[test]
    fn tool_call_with_mismatched_result_rejected() {
        let mut h = ConversationHistory::new();
        h.push(Turn::user_text("order please"));
        h.push(Turn::model_tool_call("place_order", json!({})));
        h.push(Turn::user_tool_result("get_menu", json!({})));
        assert!(!h.is_well_formed());
    }

    #[test]
    fn unanswered_tool_call_rejected() {
        let mut h = ConversationHistory::new();
        h.push(Turn::user_text("order please"));
        h.push(Turn::model_tool_call("place_order", json!({})));
        assert!(!h.is_well_formed());
    }

    #[test]
    fn truncate_rolls_back_to_checkpoint() {
        let mut h = ConversationHistory::new();
        h.push(Turn::user_text("hi"));
        h.push(Turn::model_text("hello"));
        let checkpoint = h.len();

        h.push(Turn::user_text("partial"));
        h.push(Turn::model_tool_call("place_order", json!({})));
        h.truncate(checkpoint);

        assert_eq!(h.len(), checkpoint);
        assert!(h.is_well_formed());
    }

    #[test]
    fn truncate_beyond_len_is_noop() {
        let mut h = ConversationHistory::new();
        h.push(Turn::user_text("hi"));
        h.truncate(5);
        assert_eq!(h.len(), 1);
    }
}
