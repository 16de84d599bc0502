//! Demo application served by the `serve` command.
//!
//! HTTP side: `/` (index of links) and `/rooms/<room>` (room page).
//! Socket side: `/echo` (`echo`) and the `chat` blueprint at `/chat/<room>`
//! (`chat.room`).

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;

use crate::config::ServerConfig;
use crate::http::{ConnectionContext, Dispatcher, HttpRoutes};
use crate::registry::{Blueprint, BlueprintOptions, HandlerResult, Sockets};
use crate::routing::{BuildError, ConfigError, UrlFor};

/// Echo every text and binary frame back to the sender.
pub async fn echo(mut socket: WebSocket, _cx: ConnectionContext) -> HandlerResult {
    while let Some(message) = socket.recv().await {
        match message? {
            Message::Text(text) => socket.send(Message::Text(text)).await?,
            Message::Binary(data) => socket.send(Message::Binary(data)).await?,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
    Ok(())
}

/// Greet with the room's own URL, then echo text frames tagged with the room.
pub async fn room(mut socket: WebSocket, cx: ConnectionContext) -> HandlerResult {
    let name = cx.param("room").unwrap_or_default().to_string();
    let welcome = json!({
        "room": name,
        "session": cx.session_id().to_string(),
        "url": cx.url_for("chat.room", &[("room", name.as_str())])?,
        "user": cx.cookie("user"),
    });
    socket.send(Message::Text(welcome.to_string().into())).await?;

    while let Some(message) = socket.recv().await {
        match message? {
            Message::Text(text) => {
                let reply = format!("[{name}] {}", text.as_str());
                socket.send(Message::Text(reply.into())).await?;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}

/// Socket endpoints: `echo` and the `chat` blueprint.
pub fn sockets() -> Result<Sockets<WebSocket>, ConfigError> {
    let mut chat = Blueprint::<WebSocket>::new("chat").with_url_prefix("/chat");
    chat.route("/<room>", room)?;
    let chat = Arc::new(chat);

    let mut sockets = Sockets::<WebSocket>::new();
    sockets
        .route("/echo", echo)?
        .register_blueprint(&chat, BlueprintOptions::new())?;
    Ok(sockets)
}

/// HTTP endpoints, served and buildable from one declaration.
pub fn http_routes() -> Result<HttpRoutes, ConfigError> {
    HttpRoutes::new()
        .get("/", "index", index)?
        .get("/rooms/<room>", "room_page", room_page)
}

/// Dispatcher wiring the demo sockets in front of the demo HTTP app.
pub fn dispatcher(
    config: &ServerConfig,
) -> Result<Dispatcher<WebSocketUpgrade, Router>, ConfigError> {
    let (table, app) = http_routes()?.into_parts();
    Ok(Dispatcher::new(sockets()?, app)
        .with_http_routes(table)
        .with_url_config(config.url.clone()))
}

async fn index(Extension(urls): Extension<UrlFor>) -> Result<Json<serde_json::Value>, BuildFailed> {
    Ok(Json(json!({
        "index": urls.url_for("index", &[])?,
        "room_page": urls.url_for("room_page", &[("room", "general")])?,
        "echo": urls.url_for("echo", &[])?,
        "chat": urls.url_for("chat.room", &[("room", "general")])?,
    })))
}

async fn room_page(
    Path(room): Path<String>,
    Extension(urls): Extension<UrlFor>,
) -> Result<Json<serde_json::Value>, BuildFailed> {
    Ok(Json(json!({
        "room": room,
        "socket": urls.url_for("chat.room", &[("room", room.as_str())])?,
    })))
}

struct BuildFailed(BuildError);

impl From<BuildError> for BuildFailed {
    fn from(error: BuildError) -> Self {
        Self(error)
    }
}

impl IntoResponse for BuildFailed {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "URL build failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_tables_register() {
        let sockets = sockets().unwrap();
        let endpoints: Vec<_> = sockets.url_map().rules().map(|r| r.endpoint()).collect();
        assert_eq!(endpoints, ["echo", "chat.room"]);
        let http = http_routes().unwrap();
        let endpoints: Vec<_> = http.table().rules().map(|r| r.endpoint()).collect();
        assert_eq!(endpoints, ["index", "room_page"]);
    }
}
