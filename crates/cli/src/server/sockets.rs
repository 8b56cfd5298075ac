//! WebSocket endpoints (the extension uplink and downstream CDP clients) plus
//! the discovery documents that point clients at them.
//!
//! Each socket gets a writer task draining the hub's [`Outbound`] queue, while
//! the handler reads frames and feeds them to the hub.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bridge::{BridgeError, ClientLink, ExtensionLink, Outbound, RelayHub};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};

use super::AppState;
use super::response::{ApiResult, ok};
use crate::error::ApiError;

/// Claims the single extension slot before upgrading, so a second extension
/// sees 409 instead of a socket that is closed right away.
pub async fn extension(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
	let hub = state.bridge.hub().clone();
	let Some(link) = hub.connect_extension().await else {
		return ApiError::ExtensionAlreadyConnected.into_response();
	};

	let generation = link.generation;
	let release = hub.clone();
	ws.on_failed_upgrade(move |err| {
		warn!(target = "bridge.http", error = %err, "extension upgrade failed");
		tokio::spawn(async move { release.disconnect_extension(generation).await });
	})
	.on_upgrade(move |socket| run_extension(socket, hub, link))
}

async fn run_extension(socket: WebSocket, hub: RelayHub, link: ExtensionLink) {
	let generation = link.generation;
	info!(target = "bridge.http", generation, "extension socket open");

	let (ws_tx, mut ws_rx) = socket.split();
	let writer = spawn_writer(ws_tx, link.outbound);
	let heartbeat = hub.spawn_heartbeat(generation);

	while let Some(msg) = ws_rx.next().await {
		match msg {
			Ok(Message::Text(text)) => {
				if let Err(err) = hub.handle_extension_message(text.as_str()).await {
					warn!(target = "bridge.http", error = %err, "failed handling extension message");
				}
			}
			Ok(Message::Close(_)) => break,
			Ok(_) => {}
			Err(err) => {
				warn!(target = "bridge.http", error = %err, "extension websocket error");
				break;
			}
		}
	}

	heartbeat.abort();
	hub.disconnect_extension(generation).await;
	writer.abort();
	info!(target = "bridge.http", generation, "extension socket closed");
}

pub async fn cdp(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
	client_upgrade(ws, state.bridge.hub().clone(), None).await
}

pub async fn cdp_named(
	Path(client_id): Path<String>,
	ws: WebSocketUpgrade,
	State(state): State<AppState>,
) -> Response {
	client_upgrade(ws, state.bridge.hub().clone(), Some(client_id)).await
}

async fn client_upgrade(ws: WebSocketUpgrade, hub: RelayHub, client_id: Option<String>) -> Response {
	let Some(link) = hub.connect_client(client_id).await else {
		return ApiError::from(BridgeError::ExtensionDisconnected).into_response();
	};

	let release = hub.clone();
	let (id, connection) = (link.client_id.clone(), link.connection);
	ws.on_failed_upgrade(move |err| {
		warn!(target = "bridge.http", client = %id, error = %err, "client upgrade failed");
		tokio::spawn(async move { release.disconnect_client(&id, connection).await });
	})
	.on_upgrade(move |socket| run_client(socket, hub, link))
}

async fn run_client(socket: WebSocket, hub: RelayHub, link: ClientLink) {
	let ClientLink {
		client_id,
		connection,
		outbound,
	} = link;
	info!(target = "bridge.http", client = %client_id, "CDP client socket open");

	let (ws_tx, mut ws_rx) = socket.split();
	let writer = spawn_writer(ws_tx, outbound);

	while let Some(msg) = ws_rx.next().await {
		match msg {
			// Forwarded commands wait on the extension; handle each one on its
			// own task so the client can pipeline.
			Ok(Message::Text(text)) => {
				let hub = hub.clone();
				let client_id = client_id.clone();
				tokio::spawn(async move {
					if let Err(err) = hub.handle_client_message(&client_id, text.as_str()).await {
						warn!(target = "bridge.http", client = %client_id, error = %err, "malformed client command");
					}
				});
			}
			Ok(Message::Close(_)) => break,
			Ok(_) => {}
			Err(err) => {
				warn!(target = "bridge.http", client = %client_id, error = %err, "client websocket error");
				break;
			}
		}
	}

	hub.disconnect_client(&client_id, connection).await;
	writer.abort();
	info!(target = "bridge.http", client = %client_id, "CDP client socket closed");
}

/// Drains `outbound` into the socket until the queue closes, the socket
/// fails, or the hub asks for a close.
fn spawn_writer(mut ws_tx: SplitSink<WebSocket, Message>, outbound: UnboundedReceiver<Outbound>) -> JoinHandle<()> {
	let mut frames = UnboundedReceiverStream::new(outbound);
	tokio::spawn(async move {
		while let Some(frame) = frames.next().await {
			let message = match frame {
				Outbound::Text(text) => Message::Text(text.into()),
				Outbound::Close => {
					let _ = ws_tx.send(Message::Close(None)).await;
					break;
				}
			};
			if ws_tx.send(message).await.is_err() {
				break;
			}
		}
	})
}

fn ws_url(headers: &HeaderMap) -> String {
	let host = headers
		.get(axum::http::header::HOST)
		.and_then(|h| h.to_str().ok())
		.unwrap_or("127.0.0.1");
	format!("ws://{host}/cdp")
}

/// `/json/version`, so CDP clients can discover the relay like a browser.
pub async fn json_version(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
	let version = state.bridge.hub().discovery_version(&ws_url(&headers));
	Ok(axum::Json(serde_json::to_value(version)?))
}

pub async fn json_list(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
	let pages = state.bridge.hub().discovery_targets(&ws_url(&headers)).await;
	Ok(axum::Json(serde_json::to_value(pages)?))
}

pub async fn health() -> ApiResult {
	ok(())
}
