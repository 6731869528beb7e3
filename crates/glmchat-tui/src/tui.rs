//! Terminal setup and the event channel that drives the main loop.

use std::io::{self, Stderr};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEvent, KeyEventKind,
        MouseEvent,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::app::Generation;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

/// How often the "Thinking" indicator advances.
const ANIMATION_INTERVAL: Duration = Duration::from_millis(300);

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize,
    Tick,
    /// A background reply finished, successfully or not.
    Generated(Generation),
}

/// Keep key presses, mouse and resize; drop releases, focus and paste.
fn translate(event: Event) -> Option<AppEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
        Event::Mouse(mouse) => Some(AppEvent::Mouse(mouse)),
        Event::Resize(..) => Some(AppEvent::Resize),
        _ => None,
    }
}

/// Everything the main loop reacts to arrives through one channel: terminal
/// input, animation ticks, and finished generations.
pub struct Events {
    tx: UnboundedSender<AppEvent>,
    rx: UnboundedReceiver<AppEvent>,
}

impl Events {
    pub fn start() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(forward_terminal(tx.clone()));
        tokio::spawn(animate(tx.clone()));
        Self { tx, rx }
    }

    /// Handle for background work that reports back to the loop.
    pub fn sender(&self) -> UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

async fn forward_terminal(tx: UnboundedSender<AppEvent>) {
    let mut reader = EventStream::new();
    while let Some(event) = reader.next().await {
        match event {
            Ok(event) => {
                if let Some(event) = translate(event) {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            }
            Err(e) => {
                tracing::warn!("terminal input failed: {e}");
                break;
            }
        }
    }
}

async fn animate(tx: UnboundedSender<AppEvent>) {
    let mut interval = tokio::time::interval(ANIMATION_INTERVAL);
    loop {
        interval.tick().await;
        if tx.send(AppEvent::Tick).is_err() {
            break;
        }
    }
}

/// Raw mode on the alternate screen with mouse capture. Dropping the guard,
/// or panicking while it is alive, hands the terminal back.
pub struct TerminalGuard {
    pub terminal: Tui,
}

impl TerminalGuard {
    pub fn enter() -> Result<Self> {
        install_panic_hook();
        enable_raw_mode()?;
        execute!(io::stderr(), EnterAlternateScreen, EnableMouseCapture)?;

        let terminal = Terminal::new(CrosstermBackend::new(io::stderr()))?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = leave() {
            tracing::warn!("could not restore terminal: {e}");
        }
    }
}

fn leave() -> io::Result<()> {
    execute!(io::stderr(), DisableMouseCapture, LeaveAlternateScreen)?;
    disable_raw_mode()
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        // Print the panic on the normal screen
        let _ = leave();
        previous(info);
    }));
}
