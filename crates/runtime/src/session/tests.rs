use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use super::*;

/// Starts a one-connection fake browser endpoint.
///
/// * `Echo.*` replies with `{"method": <method>, "params": <params>}`
/// * `Fail.*` replies with a CDP error object
/// * `Silent.*` never replies
/// * `Page.navigate` emits `Page.frameNavigated` before replying
/// * `Browser.close` closes the socket without replying
async fn fake_browser() -> String {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

		while let Some(Ok(frame)) = ws.next().await {
			let Message::Text(text) = frame else { continue };
			let request: Value = serde_json::from_str(&text).unwrap();
			let id = request["id"].clone();
			let method = request["method"].as_str().unwrap_or_default().to_string();

			let reply = if method.starts_with("Echo.") {
				json!({"id": id, "result": {"method": method, "params": request["params"], "sessionId": request["sessionId"]}})
			} else if method.starts_with("Fail.") {
				json!({"id": id, "error": {"code": -32000, "message": "Cannot find context with specified id"}})
			} else if method == "Page.navigate" {
				let event = json!({"method": "Page.frameNavigated", "params": {"url": request["params"]["url"]}, "sessionId": "S1"});
				ws.send(Message::Text(event.to_string())).await.unwrap();
				json!({"id": id, "result": {"frameId": "F1"}})
			} else if method == "Browser.close" {
				let _ = ws.close(None).await;
				return;
			} else {
				continue;
			};
			ws.send(Message::Text(reply.to_string())).await.unwrap();
		}
	});

	format!("ws://{addr}")
}

#[tokio::test]
async fn call_correlates_reply_by_id() {
	let url = fake_browser().await;
	let session = CdpSession::connect(&url).await.unwrap();

	let first = session.call("Echo.one", json!({"n": 1}), None).await.unwrap();
	let second = session.call("Echo.two", json!({"n": 2}), Some("S9")).await.unwrap();

	assert_eq!(first["method"], "Echo.one");
	assert_eq!(first["params"]["n"], 1);
	assert_eq!(second["method"], "Echo.two");
	assert_eq!(second["sessionId"], "S9");
	assert_eq!(session.pending_count(), 0);
}

#[tokio::test]
async fn concurrent_calls_resolve_independently() {
	let url = fake_browser().await;
	let session = CdpSession::connect(&url).await.unwrap();

	let (a, b, c) = tokio::join!(
		session.call("Echo.a", Value::Null, None),
		session.call("Echo.b", Value::Null, None),
		session.call("Echo.c", Value::Null, None),
	);

	assert_eq!(a.unwrap()["method"], "Echo.a");
	assert_eq!(b.unwrap()["method"], "Echo.b");
	assert_eq!(c.unwrap()["method"], "Echo.c");
}

#[tokio::test]
async fn protocol_error_is_surfaced() {
	let url = fake_browser().await;
	let session = CdpSession::connect(&url).await.unwrap();

	let err = session.call("Fail.evaluate", Value::Null, None).await.unwrap_err();
	match err {
		CdpError::Protocol { code, message } => {
			assert_eq!(code, -32000);
			assert_eq!(message, "Cannot find context with specified id");
		}
		other => panic!("expected protocol error, got {other:?}"),
	}
}

#[tokio::test]
async fn unanswered_call_times_out_and_is_removed() {
	let url = fake_browser().await;
	let session = CdpSession::connect_with_timeout(&url, Duration::from_millis(150)).await.unwrap();

	let err = session.call("Silent.wait", Value::Null, None).await.unwrap_err();

	assert!(matches!(err, CdpError::Timeout { ref method, timeout_ms: 150 } if method == "Silent.wait"));
	assert_eq!(session.pending_count(), 0);
}

#[tokio::test]
async fn events_reach_subscribers() {
	let url = fake_browser().await;
	let session = CdpSession::connect(&url).await.unwrap();
	let mut navigations = session.subscribe("Page.frameNavigated");

	session.call("Page.navigate", json!({"url": "https://example.com"}), Some("S1")).await.unwrap();

	let event = tokio::time::timeout(Duration::from_secs(2), navigations.recv()).await.unwrap().unwrap();
	assert_eq!(event.params["url"], "https://example.com");
	assert_eq!(event.session_id.as_deref(), Some("S1"));
}

#[tokio::test]
async fn socket_close_fails_pending_and_later_calls() {
	let url = fake_browser().await;
	let session = CdpSession::connect(&url).await.unwrap();

	let err = session.call("Browser.close", Value::Null, None).await.unwrap_err();
	assert!(matches!(err, CdpError::SessionClosed));

	for _ in 0..50 {
		if session.is_closed() {
			break;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	assert!(session.is_closed());
	assert!(matches!(session.call("Echo.after", Value::Null, None).await, Err(CdpError::SessionClosed)));
}

#[tokio::test]
async fn connect_to_dead_port_fails() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);

	let err = CdpSession::connect(&format!("ws://{addr}")).await.err().unwrap();
	assert!(matches!(err, CdpError::ConnectionFailed(_)));
}
