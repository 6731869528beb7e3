use std::fs::{self, File};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use glmchat_core::{ChatSession, ModelArgs};
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{Events, TerminalGuard};

#[derive(Parser)]
#[command(name = "glmchat")]
#[command(about = "Terminal chat for a quantized LLM")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    model: ModelArgs,
}

/// The terminal belongs to the UI, so logs go to a file.
fn init_logging() -> Result<()> {
    let dir = dirs::data_local_dir()
        .context("Could not find local data directory")?
        .join("glmchat");
    fs::create_dir_all(&dir)?;
    let file = File::create(dir.join("glmchat-tui.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let settings = cli.model.settings()?;
    let title = settings
        .model_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "glmchat".to_string());

    eprintln!("Loading model from {}...", settings.model_path.display());
    tracing::info!("====Loading model====");
    let session = tokio::task::spawn_blocking(move || ChatSession::load(&settings)).await??;

    let mut guard = TerminalGuard::enter()?;
    let mut events = Events::start();
    let mut app = App::new(session, title, events.sender());

    run(&mut guard.terminal, &mut app, &mut events).await
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut Events) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}
