//! UI-agnostic conversation state
//!
//! This module contains the data structures shared between the front-ends
//! (web page, terminal chat) and don't depend on any specific UI framework.

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// A role-tagged message as consumed by the chat template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One user/assistant exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user_text: String,
    pub assistant_text: String,
}

impl Turn {
    pub fn is_awaiting_reply(&self) -> bool {
        self.assistant_text.is_empty()
    }
}

/// The visible conversation.
///
/// Turns are only ever appended. The single exception is the reply of the
/// most recent turn, which is filled in once per send cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Append a new turn with an empty reply.
    pub fn push_user(&mut self, user_text: impl Into<String>) {
        self.turns.push(Turn {
            user_text: user_text.into(),
            assistant_text: String::new(),
        });
    }

    /// Fill in the reply of the pending last turn.
    pub fn complete_last(&mut self, reply: impl Into<String>) -> Result<()> {
        match self.turns.last_mut() {
            Some(turn) if turn.is_awaiting_reply() => {
                turn.assistant_text = reply.into();
                Ok(())
            }
            _ => Err(ChatError::NoPendingTurn),
        }
    }

    /// Drop the last turn if it never received a reply.
    pub fn discard_pending(&mut self) -> Option<Turn> {
        if self.turns.last().is_some_and(Turn::is_awaiting_reply) {
            self.turns.pop()
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

impl From<Vec<Turn>> for History {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

impl<U: Into<String>, A: Into<String>> FromIterator<(U, A)> for History {
    fn from_iter<I: IntoIterator<Item = (U, A)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(user, assistant)| Turn {
                user_text: user.into(),
                assistant_text: assistant.into(),
            })
            .collect::<Vec<_>>()
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_then_complete() {
        let mut history = History::new();
        history.push_user("hi");
        assert!(history.last().unwrap().is_awaiting_reply());

        history.complete_last("hello").unwrap();
        assert_eq!(history.turns()[0].assistant_text, "hello");
    }

    #[test]
    fn test_complete_only_once() {
        let mut history = History::new();
        history.push_user("hi");
        history.complete_last("hello").unwrap();

        let err = history.complete_last("again").unwrap_err();
        assert!(matches!(err, ChatError::NoPendingTurn));
        assert_eq!(history.turns()[0].assistant_text, "hello");
    }

    #[test]
    fn test_complete_empty_history() {
        let mut history = History::new();
        assert!(matches!(
            history.complete_last("x"),
            Err(ChatError::NoPendingTurn)
        ));
    }

    #[test]
    fn test_discard_pending_keeps_answered_turns() {
        let mut history: History = [("hi", "hello")].into_iter().collect();
        assert!(history.discard_pending().is_none());
        assert_eq!(history.len(), 1);

        history.push_user("bye");
        let dropped = history.discard_pending().unwrap();
        assert_eq!(dropped.user_text, "bye");
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_clear_empties_history() {
        let mut history: History = [("a", "b"), ("c", "d")].into_iter().collect();
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }
}
