//! User-channel relay between the browser extension and CDP clients.
//!
//! The hub owns all relay state behind one lock: the single extension socket,
//! connected automation clients, the targets the extension has attached, and
//! requests awaiting an extension reply. Socket plumbing lives in the server;
//! the hub only sees text frames and hands back [`Outbound`] queues.
//!
//! # Lifecycle
//!
//! * [`RelayHub::connect_extension`] claims the extension slot; a second
//!   extension is refused while the first is live.
//! * [`RelayHub::disconnect_extension`] rejects every pending request, clears
//!   the target registry and closes every client.
//! * Clients may only connect while an extension is present.

mod router;
#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bridge_protocol::{
	BrowserVersion, ClientCommand, ExtensionMessage, ExtensionRequest, ForwardedEvent, PageInfo, ParseError, Tab,
};
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, trace, warn};

use self::router::Route;
use crate::config::RelayConfig;
use crate::error::{BridgeError, Result};

/// Frame queued for one socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
	Text(String),
	Close,
}

impl Outbound {
	fn json(value: &Value) -> Self {
		Outbound::Text(value.to_string())
	}
}

/// A tab the extension has attached, keyed by its session id.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedTarget {
	pub session_id: String,
	pub target_id: String,
	pub target_info: Value,
}

impl ConnectedTarget {
	pub fn to_tab(&self) -> Tab {
		Tab {
			id: self.target_id.clone(),
			session_id: Some(self.session_id.clone()),
			title: self.target_info["title"].as_str().unwrap_or_default().to_string(),
			url: self.target_info["url"].as_str().unwrap_or_default().to_string(),
		}
	}
}

struct PendingRequest {
	method: String,
	reply: oneshot::Sender<Result<Value>>,
	timer: AbortHandle,
}

struct ExtensionConn {
	generation: u64,
	tx: mpsc::UnboundedSender<Outbound>,
}

struct ClientConn {
	connection: u64,
	tx: mpsc::UnboundedSender<Outbound>,
}

#[derive(Default)]
struct RelayState {
	extension: Option<ExtensionConn>,
	clients: HashMap<String, ClientConn>,
	connected_targets: BTreeMap<String, ConnectedTarget>,
	pending: HashMap<u64, PendingRequest>,
	next_request_id: u64,
	next_generation: u64,
	next_client: u64,
	next_connection: u64,
}

impl RelayState {
	fn broadcast(&mut self, message: &Value) {
		let frame = Outbound::json(message);
		self.clients.retain(|_, client| client.tx.send(frame.clone()).is_ok());
	}

	/// Drops the extension and everything that depended on it.
	fn clear_extension(&mut self) {
		self.extension = None;
		self.connected_targets.clear();
		for (_, pending) in self.pending.drain() {
			pending.timer.abort();
			let _ = pending.reply.send(Err(BridgeError::ExtensionDisconnected));
		}
		for (_, client) in self.clients.drain() {
			let _ = client.tx.send(Outbound::Close);
		}
	}
}

/// Receiving half of a claimed extension slot.
#[derive(Debug)]
pub struct ExtensionLink {
	pub generation: u64,
	pub outbound: mpsc::UnboundedReceiver<Outbound>,
}

/// Receiving half of a connected automation client.
#[derive(Debug)]
pub struct ClientLink {
	pub client_id: String,
	/// Distinguishes this socket from a later one reusing the same id.
	pub connection: u64,
	pub outbound: mpsc::UnboundedReceiver<Outbound>,
}

#[derive(Clone)]
pub struct RelayHub {
	state: Arc<Mutex<RelayState>>,
	config: RelayConfig,
}

impl RelayHub {
	pub fn new(config: RelayConfig) -> Self {
		Self {
			state: Arc::new(Mutex::new(RelayState::default())),
			config,
		}
	}

	pub async fn is_extension_connected(&self) -> bool {
		self.state.lock().await.extension.is_some()
	}

	/// Claims the extension slot, or `None` while another extension is live.
	pub async fn connect_extension(&self) -> Option<ExtensionLink> {
		let mut state = self.state.lock().await;
		if state.extension.is_some() {
			warn!(target = "bridge.relay", "refusing second extension connection");
			return None;
		}
		state.next_generation += 1;
		let generation = state.next_generation;
		let (tx, outbound) = mpsc::unbounded_channel();
		state.extension = Some(ExtensionConn { generation, tx });
		info!(target = "bridge.relay", generation, "extension connected");
		Some(ExtensionLink { generation, outbound })
	}

	/// Releases the slot if `generation` still owns it.
	pub async fn disconnect_extension(&self, generation: u64) {
		let mut state = self.state.lock().await;
		if state.extension.as_ref().map(|ext| ext.generation) != Some(generation) {
			return;
		}
		let pending = state.pending.len();
		let clients = state.clients.len();
		state.clear_extension();
		info!(target = "bridge.relay", generation, pending, clients, "extension disconnected");
	}

	/// Sends `ping` to the extension on the configured interval until the
	/// connection identified by `generation` goes away.
	pub fn spawn_heartbeat(&self, generation: u64) -> JoinHandle<()> {
		let hub = self.clone();
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(hub.config.heartbeat_interval());
			ticker.tick().await;
			loop {
				ticker.tick().await;
				let state = hub.state.lock().await;
				match &state.extension {
					Some(ext) if ext.generation == generation => {
						if ext.tx.send(Outbound::json(&bridge_protocol::relay::heartbeat())).is_err() {
							break;
						}
					}
					_ => break,
				}
			}
			trace!(target = "bridge.relay", generation, "heartbeat stopped");
		})
	}

	/// Processes one text frame from the extension.
	pub async fn handle_extension_message(&self, raw: &str) -> std::result::Result<(), ParseError> {
		match ExtensionMessage::parse(raw)? {
			ExtensionMessage::Reply { id, outcome } => {
				let pending = self.state.lock().await.pending.remove(&id);
				match pending {
					Some(pending) => {
						pending.timer.abort();
						trace!(target = "bridge.relay", id, method = %pending.method, "extension reply");
						let _ = pending.reply.send(outcome.map_err(BridgeError::upstream));
					}
					None => debug!(target = "bridge.relay", id, "reply for unknown or expired request"),
				}
			}
			ExtensionMessage::Event(event) => self.handle_event(event).await,
			ExtensionMessage::Log { level, args } => {
				let text = args.iter().map(log_arg).collect::<Vec<_>>().join(" ");
				match level.as_str() {
					"error" => warn!(target = "bridge.extension", level = %level, "{text}"),
					_ => debug!(target = "bridge.extension", level = %level, "{text}"),
				}
			}
			ExtensionMessage::Pong => trace!(target = "bridge.relay", "pong"),
			ExtensionMessage::Unknown { method } => {
				debug!(target = "bridge.relay", method = %method, "ignoring unknown extension message");
			}
		}
		Ok(())
	}

	/// Updates the target registry from a forwarded event, then rebroadcasts.
	///
	/// Registry fields are read from the event's own params. When a known
	/// session is reused for a different target, clients first receive a
	/// synthetic detach for the old target. An attach that only refreshes
	/// metadata for the same target is not rebroadcast.
	async fn handle_event(&self, event: ForwardedEvent) {
		let mut state = self.state.lock().await;
		let mut outgoing = Vec::with_capacity(2);

		match event.method.as_str() {
			"Target.attachedToTarget" => {
				let session_id = event.params["sessionId"].as_str();
				let target_info = &event.params["targetInfo"];
				let target_id = target_info["targetId"].as_str();
				let (Some(session_id), Some(target_id)) = (session_id, target_id) else {
					warn!(target = "bridge.relay", "attachedToTarget without sessionId/targetId");
					return;
				};

				let previous = state.connected_targets.insert(
					session_id.to_string(),
					ConnectedTarget {
						session_id: session_id.to_string(),
						target_id: target_id.to_string(),
						target_info: target_info.clone(),
					},
				);
				match previous {
					Some(prev) if prev.target_id == target_id => {
						debug!(target = "bridge.relay", session_id, target_id, "target metadata refreshed");
						return;
					}
					Some(prev) => {
						info!(
							target = "bridge.relay",
							session_id,
							old_target = %prev.target_id,
							new_target = target_id,
							"session reused for a different target"
						);
						outgoing.push(json!({
							"method": "Target.detachedFromTarget",
							"params": { "sessionId": session_id, "targetId": prev.target_id },
						}));
					}
					None => info!(target = "bridge.relay", session_id, target_id, "target attached"),
				}
			}
			"Target.detachedFromTarget" => {
				if let Some(session_id) = event.params["sessionId"].as_str() {
					let target_id = event.params["targetId"].as_str();
					let current = state.connected_targets.get(session_id).map(|t| t.target_id.clone());
					match (current, target_id) {
						// Late detach for a target the session no longer points at; the
						// synthetic detach already went out on reattach.
						(Some(current), Some(target_id)) if current != target_id => {
							debug!(target = "bridge.relay", session_id, target_id, %current, "stale detach ignored");
							return;
						}
						(Some(_), _) => {
							state.connected_targets.remove(session_id);
							info!(target = "bridge.relay", session_id, "target detached");
						}
						(None, _) => {}
					}
				}
			}
			"Target.targetInfoChanged" => {
				let info = &event.params["targetInfo"];
				if let Some(target_id) = info["targetId"].as_str() {
					for target in state.connected_targets.values_mut() {
						if target.target_id == target_id {
							target.target_info = info.clone();
						}
					}
				}
			}
			_ => {}
		}

		outgoing.push(event.to_client_message());
		for message in &outgoing {
			state.broadcast(message);
		}
	}

	/// Forwards a CDP command to the extension and waits for its reply.
	pub async fn send_command(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
		self.request(method, |id| ExtensionRequest::forward_cdp(id, method, params, session_id))
			.await
	}

	/// Invokes an extension-side tool by name.
	pub async fn call_tool(&self, name: &str, args: Value, tab_id: Option<&str>) -> Result<Value> {
		self.request(name, |id| ExtensionRequest::execute_tool(id, name, args, tab_id))
			.await
	}

	async fn request(&self, method: &str, build: impl FnOnce(u64) -> ExtensionRequest) -> Result<Value> {
		let (reply, rx) = oneshot::channel();
		{
			let mut state = self.state.lock().await;
			let Some(ext_tx) = state.extension.as_ref().map(|ext| ext.tx.clone()) else {
				return Err(BridgeError::ExtensionDisconnected);
			};
			state.next_request_id += 1;
			let id = state.next_request_id;
			let payload = serde_json::to_string(&build(id))?;

			let timer = self.spawn_expiry(id);
			state.pending.insert(
				id,
				PendingRequest {
					method: method.to_string(),
					reply,
					timer,
				},
			);
			if ext_tx.send(Outbound::Text(payload)).is_err() {
				if let Some(pending) = state.pending.remove(&id) {
					pending.timer.abort();
				}
				return Err(BridgeError::ExtensionDisconnected);
			}
			trace!(target = "bridge.relay", id, method, "forwarded to extension");
		}
		rx.await.unwrap_or(Err(BridgeError::ExtensionDisconnected))
	}

	/// Rejects request `id` with a timeout unless a reply removes it first.
	fn spawn_expiry(&self, id: u64) -> AbortHandle {
		let state = Arc::clone(&self.state);
		let timeout = self.config.command_timeout();
		tokio::spawn(async move {
			tokio::time::sleep(timeout).await;
			let expired = state.lock().await.pending.remove(&id);
			if let Some(pending) = expired {
				warn!(target = "bridge.relay", id, method = %pending.method, "extension request timed out");
				let _ = pending.reply.send(Err(BridgeError::CommandTimeout {
					method: pending.method,
					timeout_ms: timeout.as_millis() as u64,
				}));
			}
		})
		.abort_handle()
	}

	/// Registers an automation client. `None` when no extension is connected.
	///
	/// Without an id the hub assigns one; reusing an id closes the previous
	/// client holding it.
	pub async fn connect_client(&self, client_id: Option<String>) -> Option<ClientLink> {
		let mut state = self.state.lock().await;
		state.extension.as_ref()?;
		let client_id = client_id.unwrap_or_else(|| {
			state.next_client += 1;
			format!("client-{}", state.next_client)
		});
		state.next_connection += 1;
		let connection = state.next_connection;
		let (tx, outbound) = mpsc::unbounded_channel();
		if let Some(previous) = state.clients.insert(client_id.clone(), ClientConn { connection, tx }) {
			let _ = previous.tx.send(Outbound::Close);
		}
		info!(target = "bridge.relay", client_id = %client_id, "CDP client connected");
		Some(ClientLink {
			client_id,
			connection,
			outbound,
		})
	}

	/// Removes the client if `connection` still holds its id.
	pub async fn disconnect_client(&self, client_id: &str, connection: u64) {
		let mut state = self.state.lock().await;
		if state.clients.get(client_id).map(|c| c.connection) == Some(connection) {
			state.clients.remove(client_id);
			info!(target = "bridge.relay", client_id, "CDP client disconnected");
		}
	}

	/// Answers one CDP command from a client, locally or via the extension.
	pub async fn handle_client_message(
		&self,
		client_id: &str,
		raw: &str,
	) -> std::result::Result<(), serde_json::Error> {
		let command: ClientCommand = serde_json::from_str(raw)?;
		debug!(target = "bridge.relay", client_id, id = command.id, method = %command.method, "client command");

		let route = {
			let state = self.state.lock().await;
			router::route_command(&state.connected_targets, &command)
		};

		let (reply, follow_up) = match route {
			Route::Answer { result, follow_up } => (command.ok(result), follow_up),
			Route::Fail(message) => (command.err(&message), Vec::new()),
			Route::Forward { session_id } => {
				let params = command.params.clone();
				match self.send_command(&command.method, params, session_id.as_deref()).await {
					Ok(result) => (command.ok(result), Vec::new()),
					Err(err) => (command.err(&err.to_string()), Vec::new()),
				}
			}
		};

		let state = self.state.lock().await;
		if let Some(client) = state.clients.get(client_id) {
			let _ = client.tx.send(Outbound::json(&reply));
			for event in &follow_up {
				let _ = client.tx.send(Outbound::json(event));
			}
		}
		Ok(())
	}

	pub async fn connected_targets(&self) -> Vec<ConnectedTarget> {
		self.state.lock().await.connected_targets.values().cloned().collect()
	}

	pub async fn tabs(&self) -> Vec<Tab> {
		self.state
			.lock()
			.await
			.connected_targets
			.values()
			.map(ConnectedTarget::to_tab)
			.collect()
	}

	/// Resolves a tab id to its session. A session id is accepted as-is.
	pub async fn session_for_target(&self, target_or_session: &str) -> Option<String> {
		let state = self.state.lock().await;
		if state.connected_targets.contains_key(target_or_session) {
			return Some(target_or_session.to_string());
		}
		state
			.connected_targets
			.values()
			.find(|t| t.target_id == target_or_session)
			.map(|t| t.session_id.clone())
	}

	/// `/json/version` payload pointing generic CDP clients at `ws_url`.
	pub fn discovery_version(&self, ws_url: &str) -> BrowserVersion {
		BrowserVersion {
			browser: router::PRODUCT.to_string(),
			protocol_version: router::PROTOCOL_VERSION.to_string(),
			user_agent: router::USER_AGENT.to_string(),
			web_socket_debugger_url: ws_url.to_string(),
		}
	}

	/// `/json/list` payload: one page per attached target, all reachable
	/// through `ws_url`.
	pub async fn discovery_targets(&self, ws_url: &str) -> Vec<PageInfo> {
		self.state
			.lock()
			.await
			.connected_targets
			.values()
			.map(|target| {
				let tab = target.to_tab();
				PageInfo {
					id: tab.id,
					page_type: target.target_info["type"].as_str().unwrap_or("page").to_string(),
					title: tab.title,
					url: tab.url,
					web_socket_debugger_url: Some(ws_url.to_string()),
				}
			})
			.collect()
	}

	pub async fn pending_count(&self) -> usize {
		self.state.lock().await.pending.len()
	}

	pub async fn client_count(&self) -> usize {
		self.state.lock().await.clients.len()
	}
}

fn log_arg(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}
