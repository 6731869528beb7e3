use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::App;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => app.scroll_to_bottom(),
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Generated(generation) => app.finish_generation(generation),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => app.should_quit = true,
            KeyCode::Char('l') => app.clear(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Enter => app.submit(),
        KeyCode::PageUp => {
            let page = app.chat_height.max(1);
            app.scroll_up(page);
        }
        KeyCode::PageDown => {
            let page = app.chat_height.max(1);
            app.scroll_down(page);
        }
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        code => edit_input(app, code),
    }
}

fn edit_input(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Generation;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use glmchat_core::{ChatSession, ChatTemplate, InferenceEngine, SamplingParams, TextCodec};
    use std::sync::Arc;

    struct NullCodec;

    impl TextCodec for NullCodec {
        fn encode(&self, _text: &str) -> glmchat_core::Result<Vec<u32>> {
            Ok(Vec::new())
        }

        fn decode(&self, _tokens: &[u32]) -> glmchat_core::Result<String> {
            Ok(String::new())
        }
    }

    struct NullEngine;

    impl InferenceEngine for NullEngine {
        fn generate(
            &self,
            prompt: &[u32],
            _params: &SamplingParams,
        ) -> glmchat_core::Result<Vec<u32>> {
            Ok(prompt.to_vec())
        }
    }

    fn new_app() -> App {
        let session = ChatSession::new(
            Arc::new(NullCodec),
            Arc::new(NullEngine),
            ChatTemplate::default(),
            SamplingParams::chat(8),
        );
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        App::new(session, "test", tx)
    }

    fn key(code: KeyCode) -> KeyEvent {
        key_with(code, KeyModifiers::NONE)
    }

    fn key_with(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_key(app, key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("héllo", 0), 0);
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("héllo", 9), 6);
    }

    #[test]
    fn test_editing_with_multibyte_chars() {
        let mut app = new_app();
        type_str(&mut app, "añb");
        assert_eq!(app.cursor, 3);

        handle_key(&mut app, key(KeyCode::Left));
        handle_key(&mut app, key(KeyCode::Backspace));
        assert_eq!(app.input, "ab");
        assert_eq!(app.cursor, 1);

        handle_key(&mut app, key(KeyCode::Home));
        handle_key(&mut app, key(KeyCode::Delete));
        assert_eq!(app.input, "b");

        handle_key(&mut app, key(KeyCode::End));
        type_str(&mut app, "ç");
        assert_eq!(app.input, "bç");
        assert_eq!(app.cursor, 2);
    }

    #[test]
    fn test_quit_keys() {
        let mut app = new_app();
        handle_key(&mut app, key(KeyCode::Esc));
        assert!(app.should_quit);

        let mut app = new_app();
        handle_key(&mut app, key_with(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_ctrl_l_clears_without_typing() {
        let mut app = new_app();
        app.history = [("hi", "hello")].into_iter().collect();
        handle_key(&mut app, key_with(KeyCode::Char('l'), KeyModifiers::CONTROL));
        assert!(app.history.is_empty());
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_scroll_keys() {
        let mut app = new_app();
        app.chat_height = 10;
        handle_key(&mut app, key(KeyCode::PageDown));
        handle_key(&mut app, key(KeyCode::Down));
        assert_eq!(app.scroll, 11);
        handle_key(&mut app, key(KeyCode::PageUp));
        handle_key(&mut app, key(KeyCode::PageUp));
        assert_eq!(app.scroll, 0);
    }

    #[test]
    fn test_finished_generation_event_updates_history() {
        let mut app = new_app();
        let generation = Generation {
            history: [("hi", "hello")].into_iter().collect(),
            result: Ok(Some("hello".to_string())),
        };
        handle_event(&mut app, AppEvent::Generated(generation));
        assert_eq!(app.history.len(), 1);
        assert!(!app.is_generating());
        assert!(app.last_error.is_none());
    }
}
