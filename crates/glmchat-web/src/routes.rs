use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Form, FromRequestParts, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap, HeaderName, StatusCode,
    },
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use glmchat_core::{ChatSession, History};
use minijinja::{context, Environment};
use serde::Deserialize;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::transcript::transcript_filter;

const SESSION_COOKIE: &str = "glmchat_session";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    session: Arc<ChatSession>,
    conversations: Arc<Mutex<HashMap<Uuid, History>>>,
    templates: Arc<Environment<'static>>,
    title: String,
}

impl AppState {
    pub fn new(session: ChatSession, title: impl Into<String>) -> anyhow::Result<Self> {
        let mut env = Environment::new();
        env.add_filter("transcript", transcript_filter);
        env.add_template("index.html", include_str!("../templates/index.html"))?;

        Ok(Self {
            session: Arc::new(session),
            conversations: Arc::new(Mutex::new(HashMap::new())),
            templates: Arc::new(env),
            title: title.into(),
        })
    }

    async fn history_of(&self, client: &Client) -> History {
        self.conversations
            .lock()
            .await
            .get(&client.id)
            .cloned()
            .unwrap_or_else(History::new)
    }
}

/// The browser a request came from, identified by a cookie. A request
/// without a valid cookie starts a new conversation.
pub struct Client {
    id: Uuid,
    fresh: bool,
}

impl Client {
    fn from_headers(headers: &HeaderMap) -> Self {
        let existing = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .and_then(|(_, value)| Uuid::parse_str(value).ok());

        match existing {
            Some(id) => Self { id, fresh: false },
            None => Self {
                id: Uuid::new_v4(),
                fresh: true,
            },
        }
    }

    /// `Set-Cookie` for a client seen for the first time.
    fn set_cookie(&self) -> Option<(HeaderName, String)> {
        self.fresh.then(|| {
            (
                SET_COOKIE,
                format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", self.id),
            )
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Client {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Errors go back to the browser as a plain 500 with the message.
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("request failed: {:#}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {:#}", self.0)).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

#[derive(Deserialize)]
pub struct SendForm {
    #[serde(default)]
    message: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/send", post(send))
        .route("/clear", post(clear))
        .route("/api/history", get(history))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(
    State(state): State<AppState>,
    client: Client,
) -> Result<impl IntoResponse, AppError> {
    let history = state.history_of(&client).await;
    let page = state.templates.get_template("index.html")?.render(context!(
        title => state.title,
        turns => history.turns(),
    ))?;
    Ok((AppendHeaders(client.set_cookie()), Html(page)))
}

async fn send(
    State(state): State<AppState>,
    client: Client,
    Form(form): Form<SendForm>,
) -> Result<impl IntoResponse, AppError> {
    let mut history = state.history_of(&client).await;
    let session = state.session.clone();

    // Generation is CPU bound and runs without holding the conversation map
    let (history, reply) = tokio::task::spawn_blocking(move || {
        let reply = session.send(&mut history, &form.message);
        (history, reply)
    })
    .await?;
    reply?;

    if !history.is_empty() {
        state.conversations.lock().await.insert(client.id, history);
    }
    Ok((AppendHeaders(client.set_cookie()), Redirect::to("/")))
}

async fn clear(State(state): State<AppState>, client: Client) -> impl IntoResponse {
    if let Some(mut history) = state.conversations.lock().await.remove(&client.id) {
        state.session.clear(&mut history);
        tracing::info!("conversation cleared");
    }
    (AppendHeaders(client.set_cookie()), Redirect::to("/"))
}

async fn history(State(state): State<AppState>, client: Client) -> Json<History> {
    Json(state.history_of(&client).await)
}
