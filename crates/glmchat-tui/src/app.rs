use std::sync::Arc;

use glmchat_core::{unescape_text, ChatError, ChatSession, History};
use tokio::sync::mpsc::UnboundedSender;

use crate::tui::AppEvent;

/// Words typed into the input box that act as commands instead of messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Stop,
    Clear,
}

impl Command {
    pub fn parse(input: &str) -> Option<Self> {
        let word = input.trim();
        if word.eq_ignore_ascii_case("stop") {
            Some(Command::Stop)
        } else if word.eq_ignore_ascii_case("clear") {
            Some(Command::Clear)
        } else {
            None
        }
    }
}

/// A finished background reply. The history is the copy the task worked on,
/// already rolled back if the send failed.
#[derive(Debug)]
pub struct Generation {
    pub history: History,
    pub result: glmchat_core::Result<Option<String>>,
}

pub struct App {
    pub should_quit: bool,
    pub title: String,

    // Input box
    pub input: String,
    pub cursor: usize,

    // Conversation
    pub history: History,
    pub pending_input: Option<String>,
    pub last_error: Option<String>,
    session: Arc<ChatSession>,
    events: UnboundedSender<AppEvent>,
    generating: bool,

    // Chat view
    pub scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub animation_frame: u8,
}

impl App {
    pub fn new(
        session: ChatSession,
        title: impl Into<String>,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            should_quit: false,
            title: title.into(),
            input: String::new(),
            cursor: 0,
            history: History::new(),
            pending_input: None,
            last_error: None,
            session: Arc::new(session),
            events,
            generating: false,
            scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
        }
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// Submit whatever is in the input box.
    pub fn submit(&mut self) {
        if self.is_generating() {
            return;
        }

        let text = std::mem::take(&mut self.input);
        self.cursor = 0;

        match Command::parse(&text) {
            Some(Command::Stop) => {
                self.should_quit = true;
                return;
            }
            Some(Command::Clear) => {
                self.clear();
                return;
            }
            None => {}
        }
        if text.trim().is_empty() {
            return;
        }

        self.last_error = None;
        self.pending_input = Some(text.clone());

        self.generating = true;
        let session = self.session.clone();
        let mut history = self.history.clone();
        let fallback = self.history.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let task = tokio::task::spawn_blocking(move || {
                let result = session.send(&mut history, &text);
                Generation { history, result }
            });
            let generation = task.await.unwrap_or_else(|e| Generation {
                history: fallback,
                result: Err(ChatError::Runtime(format!("generation task failed: {e}"))),
            });
            // Nobody is listening once the app has quit
            let _ = events.send(AppEvent::Generated(generation));
        });

        // Scroll to bottom so "Thinking..." is visible
        self.scroll_to_bottom();
    }

    /// Take over the history from a finished generation.
    pub fn finish_generation(&mut self, generation: Generation) {
        self.generating = false;
        self.history = generation.history;
        self.pending_input = None;

        match generation.result {
            Ok(Some(reply)) => tracing::debug!("reply of {} chars", reply.len()),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("generation failed: {e}");
                self.last_error = Some(e.to_string());
            }
        }

        self.scroll_to_bottom();
    }

    /// Drop the conversation. Ignored while a reply is being generated.
    pub fn clear(&mut self) {
        if self.is_generating() {
            return;
        }
        self.session.clear(&mut self.history);
        self.last_error = None;
        self.scroll = 0;
        tracing::info!("conversation cleared");
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_generating() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    /// Lines shown for one user turn in the transcript.
    pub fn user_lines(user_text: &str) -> Vec<String> {
        unescape_text(user_text).lines().map(str::to_string).collect()
    }

    /// Scroll chat to bottom so the newest text is visible
    pub fn scroll_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };
        let wrapped = |line: &str| line.chars().count() / wrap_width + 1;

        let mut total_lines: usize = 0;
        for turn in self.history.turns() {
            total_lines += 1; // "You:"
            for line in Self::user_lines(&turn.user_text) {
                total_lines += wrapped(&line);
            }
            total_lines += 1;
            if !turn.assistant_text.is_empty() {
                total_lines += 1; // "AI:"
                total_lines += turn.assistant_text.lines().map(wrapped).sum::<usize>();
                total_lines += 1;
            }
        }

        if let Some(pending) = &self.pending_input {
            total_lines += 1;
            total_lines += pending.lines().map(wrapped).sum::<usize>();
            total_lines += 3; // blank + "AI:" + "Thinking..."
        }
        if self.last_error.is_some() {
            total_lines += 1;
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        // Paragraph scroll offsets are u16
        let total_lines = u16::try_from(total_lines).unwrap_or(u16::MAX);
        self.scroll = total_lines.saturating_sub(visible_height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glmchat_core::{ChatTemplate, InferenceEngine, SamplingParams, TextCodec};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    struct CharCodec;

    impl TextCodec for CharCodec {
        fn encode(&self, text: &str) -> glmchat_core::Result<Vec<u32>> {
            Ok(text.chars().map(|c| c as u32).collect())
        }

        fn decode(&self, tokens: &[u32]) -> glmchat_core::Result<String> {
            Ok(tokens.iter().filter_map(|&t| char::from_u32(t)).collect())
        }
    }

    struct EchoEngine;

    impl InferenceEngine for EchoEngine {
        fn generate(
            &self,
            prompt: &[u32],
            _params: &SamplingParams,
        ) -> glmchat_core::Result<Vec<u32>> {
            let mut out = prompt.to_vec();
            out.extend("\n pong".chars().map(|c| c as u32));
            Ok(out)
        }
    }

    struct FailingEngine;

    impl InferenceEngine for FailingEngine {
        fn generate(
            &self,
            _prompt: &[u32],
            _params: &SamplingParams,
        ) -> glmchat_core::Result<Vec<u32>> {
            Err(ChatError::Runtime("device lost".to_string()))
        }
    }

    fn app_with(engine: impl InferenceEngine + 'static) -> (App, UnboundedReceiver<AppEvent>) {
        let session = ChatSession::new(
            Arc::new(CharCodec),
            Arc::new(engine),
            ChatTemplate::default(),
            SamplingParams::chat(16),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        (App::new(session, "test", tx), rx)
    }

    async fn wait_for_reply(app: &mut App, events: &mut UnboundedReceiver<AppEvent>) {
        while let Some(event) = events.recv().await {
            if let AppEvent::Generated(generation) = event {
                app.finish_generation(generation);
                return;
            }
        }
        panic!("event channel closed before the reply arrived");
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("stop"), Some(Command::Stop));
        assert_eq!(Command::parse("  clear \n"), Some(Command::Clear));
        assert_eq!(Command::parse("stop now"), None);
        assert_eq!(Command::parse("clearly"), None);
    }

    #[test]
    fn test_command_parse_ignores_case() {
        assert_eq!(Command::parse("STOP"), Some(Command::Stop));
        assert_eq!(Command::parse("Stop"), Some(Command::Stop));
        assert_eq!(Command::parse("Clear"), Some(Command::Clear));
        assert_eq!(Command::parse("cLeAr"), Some(Command::Clear));
    }

    #[tokio::test]
    async fn test_stop_quits() {
        let (mut app, _events) = app_with(EchoEngine);
        app.input = "STOP".to_string();
        app.submit();
        assert!(app.should_quit);
        assert!(!app.is_generating());
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let (mut app, _events) = app_with(EchoEngine);
        app.input = "   ".to_string();
        app.submit();
        assert!(!app.is_generating());
        assert!(app.history.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_records_reply() {
        let (mut app, mut events) = app_with(EchoEngine);
        app.input = "ping".to_string();
        app.cursor = 4;
        app.submit();

        assert!(app.is_generating());
        assert_eq!(app.pending_input.as_deref(), Some("ping"));
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);

        wait_for_reply(&mut app, &mut events).await;
        assert_eq!(app.history.len(), 1);
        assert_eq!(app.history.turns()[0].assistant_text, "pong");
        assert!(app.pending_input.is_none());
        assert!(app.last_error.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failure_keeps_history_and_reports() {
        let (mut app, mut events) = app_with(FailingEngine);
        app.input = "ping".to_string();
        app.submit();
        wait_for_reply(&mut app, &mut events).await;

        assert!(app.history.is_empty());
        assert!(app.last_error.as_deref().unwrap().contains("device lost"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_clear_command_empties_history() {
        let (mut app, mut events) = app_with(EchoEngine);
        app.input = "ping".to_string();
        app.submit();
        wait_for_reply(&mut app, &mut events).await;
        assert_eq!(app.history.len(), 1);

        app.input = "clear".to_string();
        app.submit();
        assert!(app.history.is_empty());
        assert_eq!(app.scroll, 0);
    }

    #[test]
    fn test_user_lines_undo_markup() {
        let lines = App::user_lines("<pre><code class=\"language-sh\"><br>ls&nbsp;&#45;l<br></code></pre>");
        assert_eq!(lines, vec!["```sh", "ls -l", "```"]);
    }

    #[tokio::test]
    async fn test_scroll_to_bottom_follows_history() {
        let (mut app, _events) = app_with(EchoEngine);
        app.chat_height = 4;
        app.chat_width = 40;
        app.history = (0..5).map(|i| (format!("q{i}"), format!("a{i}"))).collect();
        app.scroll_to_bottom();
        // 5 turns of 6 lines each
        assert_eq!(app.scroll, 30 - 4);
    }

    #[tokio::test]
    async fn test_scroll_clamps_on_long_transcript() {
        let (mut app, _events) = app_with(EchoEngine);
        app.chat_height = 10;
        app.chat_width = 40;
        // 6 lines per turn, past what a u16 can count
        app.history = (0..11_000).map(|i| (format!("q{i}"), format!("a{i}"))).collect();
        app.scroll_to_bottom();
        assert_eq!(app.scroll, u16::MAX - 10);
    }
}
