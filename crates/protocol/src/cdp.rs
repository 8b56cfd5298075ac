//! Chrome DevTools Protocol message definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// CDP command frame.
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
	pub id: u64,
	pub method: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub params: Option<Value>,
	#[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Any frame received from a CDP endpoint.
///
/// Frames with an `id` are replies to a [`CdpRequest`]; frames with a `method`
/// and no `id` are events.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpMessage {
	pub id: Option<u64>,
	pub result: Option<Value>,
	pub error: Option<CdpErrorBody>,
	pub method: Option<String>,
	pub params: Option<Value>,
	#[serde(rename = "sessionId")]
	pub session_id: Option<String>,
}

/// Error object carried by a failed CDP reply.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CdpErrorBody {
	#[serde(default)]
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

/// Entry of the `/json/list` discovery endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
	pub id: String,
	#[serde(rename = "type")]
	pub page_type: String,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub web_socket_debugger_url: Option<String>,
}

impl PageInfo {
	pub fn is_page(&self) -> bool {
		self.page_type == "page"
	}
}

/// Payload of the `/json/version` discovery endpoint.
///
/// Chrome uses PascalCase keys here, except for the debugger URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserVersion {
	#[serde(rename = "Browser", default)]
	pub browser: String,
	#[serde(rename = "Protocol-Version", default)]
	pub protocol_version: String,
	#[serde(rename = "User-Agent", default)]
	pub user_agent: String,
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn request_omits_absent_session() {
		let request = CdpRequest {
			id: 7,
			method: "Page.reload".into(),
			params: None,
			session_id: None,
		};
		let value = serde_json::to_value(&request).unwrap();
		assert_eq!(value, json!({"id": 7, "method": "Page.reload"}));
	}

	#[test]
	fn message_reads_replies_and_events() {
		let reply: CdpMessage = serde_json::from_value(json!({"id": 3, "result": {}})).unwrap();
		assert_eq!(reply.id, Some(3));
		assert!(reply.method.is_none());

		let event: CdpMessage = serde_json::from_value(json!({
			"method": "Page.loadEventFired",
			"params": {"timestamp": 1.0},
			"sessionId": "S1"
		}))
		.unwrap();
		assert_eq!(event.id, None);
		assert_eq!(event.method.as_deref(), Some("Page.loadEventFired"));
		assert_eq!(event.session_id.as_deref(), Some("S1"));
	}

	#[test]
	fn version_reads_pascal_case_keys() {
		let version: BrowserVersion = serde_json::from_value(json!({
			"Browser": "Chrome/126.0",
			"Protocol-Version": "1.3",
			"User-Agent": "Mozilla/5.0",
			"webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/abc"
		}))
		.unwrap();
		assert_eq!(version.browser, "Chrome/126.0");
		assert!(version.web_socket_debugger_url.ends_with("/abc"));
	}

	#[test]
	fn page_info_filters_on_type() {
		let worker: PageInfo = serde_json::from_value(json!({
			"id": "W", "type": "service_worker", "title": "", "url": "chrome-extension://x"
		}))
		.unwrap();
		assert!(!worker.is_page());
	}
}
