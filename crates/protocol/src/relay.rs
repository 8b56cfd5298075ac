//! Envelopes exchanged with the browser extension and with downstream CDP clients.
//!
//! The extension speaks a thin JSON protocol on top of CDP:
//!
//! 1. The relay sends [`ExtensionRequest`]s carrying a numeric `id`; the extension
//!    answers with `{id, result}` or `{id, error}`.
//! 2. The extension pushes browser events as `forwardCDPEvent` notifications
//!    without an `id`.
//! 3. Heartbeats (`ping`/`pong`) and `log` lines are notifications too.
//!
//! # Main Types
//!
//! - [`ExtensionRequest`] - relay to extension command
//! - [`ExtensionMessage`] - classified extension to relay frame
//! - [`ForwardedEvent`] - a CDP event relayed by the extension
//! - [`ClientCommand`] - a CDP command from a downstream protocol client

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

pub const FORWARD_CDP_COMMAND: &str = "forwardCDPCommand";
pub const FORWARD_CDP_EVENT: &str = "forwardCDPEvent";
pub const EXECUTE_TOOL: &str = "executeTool";
pub const PING: &str = "ping";
pub const PONG: &str = "pong";
pub const LOG: &str = "log";

/// Command sent from the relay to the extension.
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionRequest {
	pub id: u64,
	pub method: String,
	pub params: Value,
}

impl ExtensionRequest {
	/// Wraps a CDP command so the extension runs it through `chrome.debugger`.
	pub fn forward_cdp(id: u64, method: &str, params: Value, session_id: Option<&str>) -> Self {
		Self {
			id,
			method: FORWARD_CDP_COMMAND.to_string(),
			params: json!({
				"method": method,
				"sessionId": session_id,
				"params": params,
			}),
		}
	}

	/// Invokes one of the extension's own page tools (read_page, find, form_input, ...).
	pub fn execute_tool(id: u64, name: &str, args: Value, tab_id: Option<&str>) -> Self {
		Self {
			id,
			method: EXECUTE_TOOL.to_string(),
			params: json!({
				"name": name,
				"args": args,
				"tabId": tab_id,
			}),
		}
	}
}

/// Heartbeat notification; carries no id and expects no reply.
pub fn heartbeat() -> Value {
	json!({ "method": PING })
}

#[derive(Debug, Deserialize)]
struct RawFrame {
	id: Option<u64>,
	method: Option<String>,
	#[serde(default)]
	params: Value,
	result: Option<Value>,
	error: Option<Value>,
}

/// A CDP event relayed by the extension.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardedEvent {
	pub method: String,
	pub params: Value,
	/// Session the event is scoped to; `None` for browser-level events.
	pub session_id: Option<String>,
}

impl ForwardedEvent {
	/// Shapes the event the way a real browser would emit it to a CDP client.
	pub fn to_client_message(&self) -> Value {
		match &self.session_id {
			Some(sid) => json!({ "sessionId": sid, "method": self.method, "params": self.params }),
			None => json!({ "method": self.method, "params": self.params }),
		}
	}
}

/// Classified frame received from the extension.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionMessage {
	/// Reply correlated to an [`ExtensionRequest`] by id.
	Reply { id: u64, outcome: Result<Value, String> },
	Event(ForwardedEvent),
	Log { level: String, args: Vec<Value> },
	Pong,
	/// Any other notification; the relay logs and ignores it.
	Unknown { method: String },
}

#[derive(Debug, Error)]
pub enum ParseError {
	#[error("invalid JSON: {0}")]
	Json(#[from] serde_json::Error),

	#[error("message missing {0}")]
	MissingField(&'static str),
}

impl ExtensionMessage {
	pub fn parse(raw: &str) -> Result<Self, ParseError> {
		let frame: RawFrame = serde_json::from_str(raw)?;

		if let Some(id) = frame.id {
			let outcome = match frame.error {
				Some(error) => Err(error_message(&error)),
				None => Ok(frame.result.unwrap_or(Value::Null)),
			};
			return Ok(ExtensionMessage::Reply { id, outcome });
		}

		let method = frame.method.ok_or(ParseError::MissingField("method"))?;
		match method.as_str() {
			FORWARD_CDP_EVENT => {
				let event_method = frame
					.params
					.get("method")
					.and_then(Value::as_str)
					.ok_or(ParseError::MissingField("params.method"))?;
				Ok(ExtensionMessage::Event(ForwardedEvent {
					method: event_method.to_string(),
					params: frame.params.get("params").cloned().unwrap_or(Value::Null),
					session_id: frame.params.get("sessionId").and_then(Value::as_str).map(str::to_owned),
				}))
			}
			LOG => Ok(ExtensionMessage::Log {
				level: frame.params.get("level").and_then(Value::as_str).unwrap_or("info").to_string(),
				args: frame.params.get("args").and_then(Value::as_array).cloned().unwrap_or_default(),
			}),
			PONG => Ok(ExtensionMessage::Pong),
			_ => Ok(ExtensionMessage::Unknown { method }),
		}
	}
}

/// Extensions report errors either as a bare string or as a CDP-style object.
fn error_message(error: &Value) -> String {
	match error {
		Value::String(message) => message.clone(),
		other => other
			.get("message")
			.and_then(Value::as_str)
			.map(str::to_owned)
			.unwrap_or_else(|| other.to_string()),
	}
}

/// CDP command sent by a downstream protocol client to the relay.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientCommand {
	pub id: u64,
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(rename = "sessionId")]
	pub session_id: Option<String>,
}

impl ClientCommand {
	pub fn ok(&self, result: Value) -> Value {
		let mut reply = json!({ "id": self.id, "result": result });
		if let Some(sid) = &self.session_id {
			reply["sessionId"] = json!(sid);
		}
		reply
	}

	pub fn err(&self, message: &str) -> Value {
		let mut reply = json!({ "id": self.id, "error": { "message": message } });
		if let Some(sid) = &self.session_id {
			reply["sessionId"] = json!(sid);
		}
		reply
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn forward_cdp_wraps_command() {
		let request = ExtensionRequest::forward_cdp(4, "Runtime.evaluate", json!({"expression": "1"}), Some("S1"));
		let value = serde_json::to_value(&request).unwrap();
		assert_eq!(value["id"], 4);
		assert_eq!(value["method"], "forwardCDPCommand");
		assert_eq!(value["params"]["method"], "Runtime.evaluate");
		assert_eq!(value["params"]["sessionId"], "S1");
		assert_eq!(value["params"]["params"]["expression"], "1");
	}

	#[test]
	fn heartbeat_has_no_id() {
		assert!(heartbeat().get("id").is_none());
	}

	#[test]
	fn parses_reply_with_string_error() {
		let msg = ExtensionMessage::parse(r#"{"id": 9, "error": "No tab with given id"}"#).unwrap();
		assert_eq!(
			msg,
			ExtensionMessage::Reply {
				id: 9,
				outcome: Err("No tab with given id".into())
			}
		);
	}

	#[test]
	fn parses_reply_with_object_error() {
		let msg = ExtensionMessage::parse(r#"{"id": 2, "error": {"code": -32000, "message": "boom"}}"#).unwrap();
		assert!(matches!(msg, ExtensionMessage::Reply { outcome: Err(ref m), .. } if m == "boom"));
	}

	#[test]
	fn parses_forwarded_event() {
		let raw = r#"{"method":"forwardCDPEvent","params":{"method":"Page.frameNavigated","params":{"frame":{}},"sessionId":"S2"}}"#;
		let ExtensionMessage::Event(event) = ExtensionMessage::parse(raw).unwrap() else {
			panic!("expected event");
		};
		assert_eq!(event.method, "Page.frameNavigated");
		assert_eq!(event.session_id.as_deref(), Some("S2"));
		assert_eq!(
			event.to_client_message(),
			json!({"sessionId": "S2", "method": "Page.frameNavigated", "params": {"frame": {}}})
		);
	}

	#[test]
	fn event_without_method_is_rejected() {
		let err = ExtensionMessage::parse(r#"{"method":"forwardCDPEvent","params":{}}"#).unwrap_err();
		assert!(matches!(err, ParseError::MissingField("params.method")));
	}

	#[test]
	fn client_reply_echoes_session() {
		let cmd: ClientCommand =
			serde_json::from_str(r#"{"id":1,"method":"Runtime.enable","sessionId":"S1"}"#).unwrap();
		assert_eq!(cmd.ok(json!({})), json!({"id": 1, "sessionId": "S1", "result": {}}));
		assert_eq!(cmd.err("nope")["error"]["message"], "nope");
	}
}
