//! JSON-RPC session over a CDP WebSocket.
//!
//! Implements request/response correlation on top of the socket:
//!
//! 1. [`CdpSession::call`] takes the next id and parks a oneshot in the pending map
//! 2. The frame is queued for the writer task
//! 3. The reader task matches replies to pending ids and fans events out to
//!    subscribers by method name
//! 4. The caller gets the reply, a protocol error, or [`CdpError::Timeout`]
//!
//! When the socket closes every pending call fails with [`CdpError::SessionClosed`].

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use bridge_protocol::{CdpMessage, CdpRequest};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use crate::error::{CdpError, Result};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

type PendingMap = DashMap<u64, oneshot::Sender<Result<Value>>>;
type Subscribers = Mutex<HashMap<String, Vec<mpsc::UnboundedSender<CdpEvent>>>>;

/// Out-of-band notification from the browser.
#[derive(Debug, Clone)]
pub struct CdpEvent {
	pub method: String,
	pub params: Value,
	pub session_id: Option<String>,
}

struct Shared {
	pending: PendingMap,
	subscribers: Subscribers,
	closed: AtomicBool,
}

impl Shared {
	fn fail_pending(&self) {
		let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
		for id in ids {
			if let Some((_, tx)) = self.pending.remove(&id) {
				let _ = tx.send(Err(CdpError::SessionClosed));
			}
		}
	}

	fn dispatch(&self, message: CdpMessage) {
		if let Some(id) = message.id {
			let Some((_, tx)) = self.pending.remove(&id) else {
				debug!(target = "bridge.cdp", id, "reply for unknown request id");
				return;
			};
			let result = match message.error {
				Some(error) => Err(CdpError::Protocol {
					code: error.code,
					message: error.message,
				}),
				None => Ok(message.result.unwrap_or(Value::Null)),
			};
			let _ = tx.send(result);
			return;
		}

		let Some(method) = message.method else {
			return;
		};
		let mut subscribers = self.subscribers.lock();
		if let Some(listeners) = subscribers.get_mut(&method) {
			let event = CdpEvent {
				method,
				params: message.params.unwrap_or(Value::Null),
				session_id: message.session_id,
			};
			listeners.retain(|tx| tx.send(event.clone()).is_ok());
		}
	}
}

/// A connection to one CDP WebSocket endpoint (browser or page level).
pub struct CdpSession {
	outbound: mpsc::UnboundedSender<Message>,
	next_id: AtomicU64,
	shared: Arc<Shared>,
	command_timeout: Duration,
	reader: JoinHandle<()>,
	writer: JoinHandle<()>,
}

impl CdpSession {
	/// Connects with the default 30s command timeout.
	pub async fn connect(ws_url: &str) -> Result<Self> {
		Self::connect_with_timeout(ws_url, DEFAULT_COMMAND_TIMEOUT).await
	}

	pub async fn connect_with_timeout(ws_url: &str, command_timeout: Duration) -> Result<Self> {
		let (stream, _) = tokio_tungstenite::connect_async(ws_url)
			.await
			.map_err(|e| CdpError::ConnectionFailed(format!("{ws_url}: {e}")))?;
		let (mut sink, mut source) = stream.split();

		let shared = Arc::new(Shared {
			pending: DashMap::new(),
			subscribers: Mutex::new(HashMap::new()),
			closed: AtomicBool::new(false),
		});

		let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
		let writer = tokio::spawn(async move {
			while let Some(msg) = outbound_rx.recv().await {
				if sink.send(msg).await.is_err() {
					break;
				}
			}
			let _ = sink.close().await;
		});

		let reader = {
			let shared = Arc::clone(&shared);
			tokio::spawn(async move {
				while let Some(frame) = source.next().await {
					match frame {
						Ok(Message::Text(text)) => {
							trace!(target = "bridge.cdp", "recv: {}", text);
							match serde_json::from_str::<CdpMessage>(&text) {
								Ok(message) => shared.dispatch(message),
								Err(err) => warn!(target = "bridge.cdp", error = %err, "unparseable CDP frame"),
							}
						}
						Ok(Message::Close(_)) => break,
						Ok(_) => {}
						Err(err) => {
							warn!(target = "bridge.cdp", error = %err, "CDP socket error");
							break;
						}
					}
				}
				shared.closed.store(true, Ordering::SeqCst);
				shared.fail_pending();
				shared.subscribers.lock().clear();
				debug!(target = "bridge.cdp", "CDP socket closed");
			})
		};

		debug!(target = "bridge.cdp", url = ws_url, "CDP session connected");

		Ok(Self {
			outbound,
			next_id: AtomicU64::new(1),
			shared,
			command_timeout,
			reader,
			writer,
		})
	}

	pub fn is_closed(&self) -> bool {
		self.shared.closed.load(Ordering::SeqCst)
	}

	/// Number of commands still awaiting a reply.
	pub fn pending_count(&self) -> usize {
		self.shared.pending.len()
	}

	/// Sends a command and waits for its correlated reply.
	///
	/// `session_id` targets a flattened child session (`Target.attachToTarget`
	/// with `flatten: true`); `None` addresses the endpoint itself.
	pub async fn call(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
		if self.is_closed() {
			return Err(CdpError::SessionClosed);
		}

		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		let request = CdpRequest {
			id,
			method: method.to_string(),
			params: (!params.is_null()).then_some(params),
			session_id: session_id.map(str::to_owned),
		};
		let json = serde_json::to_string(&request)?;
		trace!(target = "bridge.cdp", "send: {}", json);

		let (tx, rx) = oneshot::channel();
		self.shared.pending.insert(id, tx);

		if self.outbound.send(Message::Text(json)).is_err() {
			self.shared.pending.remove(&id);
			return Err(CdpError::SessionClosed);
		}

		match tokio::time::timeout(self.command_timeout, rx).await {
			Ok(Ok(result)) => result,
			Ok(Err(_)) => Err(CdpError::SessionClosed),
			Err(_) => {
				self.shared.pending.remove(&id);
				Err(CdpError::Timeout {
					method: method.to_string(),
					timeout_ms: self.command_timeout.as_millis() as u64,
				})
			}
		}
	}

	/// Receives every future event with the given method name.
	pub fn subscribe(&self, method: &str) -> mpsc::UnboundedReceiver<CdpEvent> {
		let (tx, rx) = mpsc::unbounded_channel();
		self.shared.subscribers.lock().entry(method.to_string()).or_default().push(tx);
		rx
	}
}

impl Drop for CdpSession {
	fn drop(&mut self) {
		self.reader.abort();
		self.writer.abort();
		self.shared.fail_pending();
	}
}
