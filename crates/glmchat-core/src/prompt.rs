use crate::state::{ChatMessage, History};

/// Flatten the history into the message list fed to the chat template.
///
/// Empty fields are skipped. A final turn that is still waiting for its reply
/// contributes only its user message, so the template's generation cue lands
/// right after the last user turn.
pub fn render_messages(history: &History) -> Vec<ChatMessage> {
    let turns = history.turns();
    let mut messages = Vec::with_capacity(turns.len() * 2);

    for (idx, turn) in turns.iter().enumerate() {
        if idx == turns.len() - 1 && turn.is_awaiting_reply() {
            messages.push(ChatMessage::user(turn.user_text.as_str()));
            break;
        }
        if !turn.user_text.is_empty() {
            messages.push(ChatMessage::user(turn.user_text.as_str()));
        }
        if !turn.assistant_text.is_empty() {
            messages.push(ChatMessage::assistant(turn.assistant_text.as_str()));
        }
    }

    messages
}
