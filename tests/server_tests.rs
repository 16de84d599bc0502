//! End-to-end tests against the demo server on a real socket.

use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

mod common;
use common::start_demo_server;

async fn next_text<S>(stream: &mut S) -> String
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let message = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("timed out waiting for frame")
        .expect("stream ended")
        .expect("websocket error");
    message.to_text().unwrap().to_string()
}

#[tokio::test]
async fn echo_socket_round_trip() {
    let server = start_demo_server().await;

    let (mut ws, response) = tokio_tungstenite::connect_async(format!("ws://{}/echo", server.addr))
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));

    ws.send(Message::text("hello")).await.unwrap();
    assert_eq!(next_text(&mut ws).await, "hello");

    ws.close(None).await.unwrap();
    server.shutdown.trigger();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn chat_room_sees_params_cookies_and_its_own_url() {
    let server = start_demo_server().await;

    let mut request = format!("ws://{}/chat/general", server.addr)
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("cookie", HeaderValue::from_static("user=ann"));
    let (mut ws, _) = tokio_tungstenite::connect_async(request).await.unwrap();

    let welcome: Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(welcome["room"], "general");
    assert_eq!(welcome["user"], "ann");
    assert_eq!(
        welcome["url"],
        format!("ws://{}/chat/general", server.addr).as_str()
    );

    ws.send(Message::text("hi")).await.unwrap();
    assert_eq!(next_text(&mut ws).await, "[general] hi");

    ws.close(None).await.unwrap();
    server.shutdown.trigger();
}

#[tokio::test]
async fn upgrade_to_unknown_path_is_refused() {
    let server = start_demo_server().await;

    let result = tokio_tungstenite::connect_async(format!("ws://{}/nowhere", server.addr)).await;
    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 404);
        }
        Err(error) => panic!("expected an HTTP 404 handshake failure, got {error}"),
        Ok(_) => panic!("upgrade to an unknown path was accepted"),
    }

    server.shutdown.trigger();
}

#[tokio::test]
async fn http_requests_reach_the_app_with_url_for() {
    let server = start_demo_server().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{}/", server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));

    let links: Value = response.json().await.unwrap();
    assert_eq!(links["index"], "/");
    assert_eq!(links["room_page"], "/rooms/general");
    assert_eq!(links["echo"], format!("ws://{}/echo", server.addr).as_str());
    assert_eq!(
        links["chat"],
        format!("ws://{}/chat/general", server.addr).as_str()
    );

    let page: Value = client
        .get(format!("http://{}/rooms/lobby", server.addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        page["socket"],
        format!("ws://{}/chat/lobby", server.addr).as_str()
    );

    server.shutdown.trigger();
}

#[tokio::test]
async fn plain_get_on_socket_path_falls_through_to_the_app() {
    let server = start_demo_server().await;

    let response = reqwest::get(format!("http://{}/chat/general", server.addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    server.shutdown.trigger();
}

#[tokio::test]
async fn shutdown_stops_the_server() {
    let server = start_demo_server().await;
    server.shutdown.trigger();

    let result = tokio::time::timeout(Duration::from_secs(3), server.handle)
        .await
        .expect("server did not stop");
    assert!(result.unwrap().is_ok());
}
