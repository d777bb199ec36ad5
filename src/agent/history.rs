//! Conversation history and the backward scan used to fill in a chained
//! tool's missing `data` argument.

use serde_json::Value;

use crate::llm::Turn;

/// Append-only list of turns owned by one agent.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Array found in an earlier tool result.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredData {
    pub tool_name: String,
    pub data: Vec<Value>,
}

/// Walk `history` from newest to oldest and return the `data` array of the
/// most recent tool turn whose content parses as JSON with an array-valued
/// `data` field. Turns that are not JSON are skipped.
pub fn find_recent_data(history: &[Turn]) -> Option<RecoveredData> {
    history.iter().rev().find_map(|turn| {
        let Turn::Tool { tool_name, content } = turn else {
            return None;
        };
        match serde_json::from_str::<Value>(content) {
            Ok(Value::Object(mut result)) => match result.remove("data") {
                Some(Value::Array(data)) => Some(RecoveredData {
                    tool_name: tool_name.clone(),
                    data,
                }),
                _ => None,
            },
            _ => None,
        }
    })
}
