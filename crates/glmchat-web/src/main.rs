use anyhow::Result;
use clap::Parser;
use glmchat_core::{ChatSession, ModelArgs};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod routes;
mod transcript;

use routes::{router, AppState};

#[derive(Parser)]
#[command(name = "glmchat-web")]
#[command(about = "Web chat for a quantized LLM")]
struct Cli {
    #[command(flatten)]
    model: ModelArgs,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 7860)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli.model.settings()?;

    let title = settings
        .model_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "glmchat".to_string());

    tracing::info!("====Loading model====");
    let session = tokio::task::spawn_blocking(move || ChatSession::load(&settings)).await??;

    let app = router(AppState::new(session, title)?);

    let listener = TcpListener::bind((cli.host.as_str(), cli.port)).await?;
    tracing::info!("chat UI running on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
