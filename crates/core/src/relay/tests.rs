use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use super::*;

fn hub() -> RelayHub {
	RelayHub::new(RelayConfig::default())
}

/// Answers every request with its own `params`, so tests can see exactly what
/// the extension was asked to do.
fn spawn_fake_extension(hub: RelayHub, mut link: ExtensionLink) -> JoinHandle<()> {
	tokio::spawn(async move {
		while let Some(frame) = link.outbound.recv().await {
			let Outbound::Text(text) = frame else { break };
			let request: Value = serde_json::from_str(&text).unwrap();
			let Some(id) = request["id"].as_u64() else { continue };
			let reply = json!({ "id": id, "result": request["params"] });
			hub.handle_extension_message(&reply.to_string()).await.unwrap();
		}
	})
}

fn forwarded(method: &str, params: Value) -> String {
	json!({ "method": "forwardCDPEvent", "params": { "method": method, "params": params } }).to_string()
}

fn attach_event(session_id: &str, target_id: &str, title: &str) -> String {
	forwarded(
		"Target.attachedToTarget",
		json!({
			"sessionId": session_id,
			"targetInfo": { "targetId": target_id, "type": "page", "title": title, "url": "https://example.test/" },
			"waitingForDebugger": false,
		}),
	)
}

fn next_json(rx: &mut UnboundedReceiver<Outbound>) -> Value {
	match rx.try_recv() {
		Ok(Outbound::Text(text)) => serde_json::from_str(&text).unwrap(),
		other => panic!("expected a text frame, got {other:?}"),
	}
}

fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
	let mut frames = Vec::new();
	while let Ok(frame) = rx.try_recv() {
		frames.push(frame);
	}
	frames
}

#[tokio::test]
async fn second_extension_is_refused_until_first_leaves() {
	let hub = hub();
	let first = hub.connect_extension().await.unwrap();

	assert!(hub.connect_extension().await.is_none());
	assert!(hub.is_extension_connected().await);

	hub.disconnect_extension(first.generation).await;
	assert!(!hub.is_extension_connected().await);
	assert!(hub.connect_extension().await.is_some());
}

#[tokio::test]
async fn refused_extension_leaves_pending_request_alone() {
	let hub = hub();
	let mut first = hub.connect_extension().await.unwrap();

	let caller = hub.clone();
	let held = tokio::spawn(async move {
		caller
			.send_command("Runtime.evaluate", json!({ "expression": "1 + 1" }), Some("S1"))
			.await
	});
	let request = match first.outbound.recv().await {
		Some(Outbound::Text(text)) => serde_json::from_str::<Value>(&text).unwrap(),
		other => panic!("expected the forwarded command, got {other:?}"),
	};
	assert_eq!(hub.pending_count().await, 1);

	assert!(hub.connect_extension().await.is_none());
	assert_eq!(hub.pending_count().await, 1);

	let reply = json!({ "id": request["id"], "result": { "result": { "type": "number", "value": 2 } } });
	hub.handle_extension_message(&reply.to_string()).await.unwrap();

	let result = held.await.unwrap().unwrap();
	assert_eq!(result["result"]["value"], 2);
	assert_eq!(hub.pending_count().await, 0);
}

#[tokio::test]
async fn extension_missing_target_error_is_target_not_found() {
	let hub = hub();
	let mut link = hub.connect_extension().await.unwrap();

	let caller = hub.clone();
	let call = tokio::spawn(async move { caller.send_command("Page.reload", json!({}), Some("S9")).await });
	let Some(Outbound::Text(text)) = link.outbound.recv().await else {
		panic!("expected the forwarded command");
	};
	let request: Value = serde_json::from_str(&text).unwrap();
	let reply = json!({ "id": request["id"], "error": "No target with given id found" });
	hub.handle_extension_message(&reply.to_string()).await.unwrap();

	let err = call.await.unwrap().unwrap_err();
	assert!(matches!(err, BridgeError::TargetNotFound(ref m) if m == "No target with given id found"));
	assert_eq!(err.code(), "TARGET_NOT_FOUND");
}

#[tokio::test]
async fn stale_disconnect_does_not_drop_newer_extension() {
	let hub = hub();
	let first = hub.connect_extension().await.unwrap();
	hub.disconnect_extension(first.generation).await;
	let _second = hub.connect_extension().await.unwrap();

	hub.disconnect_extension(first.generation).await;
	assert!(hub.is_extension_connected().await);
}

#[tokio::test]
async fn command_without_extension_fails_fast() {
	let err = hub().send_command("Page.reload", json!({}), Some("S1")).await.unwrap_err();
	assert!(matches!(err, BridgeError::ExtensionDisconnected));
}

#[tokio::test]
async fn forwarded_command_round_trips() {
	let hub = hub();
	let link = hub.connect_extension().await.unwrap();
	spawn_fake_extension(hub.clone(), link);

	let result = hub
		.send_command("Runtime.evaluate", json!({"expression": "1 + 1"}), Some("S1"))
		.await
		.unwrap();

	assert_eq!(result["method"], "Runtime.evaluate");
	assert_eq!(result["sessionId"], "S1");
	assert_eq!(result["params"]["expression"], "1 + 1");
	assert_eq!(hub.pending_count().await, 0);
}

#[tokio::test]
async fn tool_call_uses_execute_tool_envelope() {
	let hub = hub();
	let link = hub.connect_extension().await.unwrap();
	spawn_fake_extension(hub.clone(), link);

	let result = hub.call_tool("read_page", json!({"filter": "all"}), Some("T1")).await.unwrap();

	assert_eq!(result["name"], "read_page");
	assert_eq!(result["tabId"], "T1");
	assert_eq!(result["args"]["filter"], "all");
}

#[tokio::test]
async fn extension_error_reply_is_upstream_protocol() {
	let hub = hub();
	let mut link = hub.connect_extension().await.unwrap();

	let call = tokio::spawn({
		let hub = hub.clone();
		async move { hub.send_command("Page.navigate", json!({"url": "bogus"}), Some("S1")).await }
	});
	let request = match link.outbound.recv().await.unwrap() {
		Outbound::Text(text) => serde_json::from_str::<Value>(&text).unwrap(),
		Outbound::Close => panic!("unexpected close"),
	};
	assert_eq!(request["method"], "forwardCDPCommand");

	let reply = json!({ "id": request["id"], "error": { "message": "Cannot navigate to invalid URL" } });
	hub.handle_extension_message(&reply.to_string()).await.unwrap();

	let err = call.await.unwrap().unwrap_err();
	assert!(matches!(err, BridgeError::UpstreamProtocol(ref m) if m == "Cannot navigate to invalid URL"));
}

#[tokio::test(start_paused = true)]
async fn unanswered_command_times_out_and_late_reply_is_ignored() {
	let hub = RelayHub::new(RelayConfig {
		command_timeout_ms: 1_000,
		..Default::default()
	});
	let _link = hub.connect_extension().await.unwrap();

	let err = hub.send_command("Page.reload", json!({}), Some("S1")).await.unwrap_err();

	assert!(matches!(err, BridgeError::CommandTimeout { ref method, timeout_ms: 1_000 } if method == "Page.reload"));
	assert_eq!(hub.pending_count().await, 0);

	hub.handle_extension_message(r#"{"id": 1, "result": {}}"#).await.unwrap();
	assert_eq!(hub.pending_count().await, 0);
}

#[tokio::test]
async fn disconnect_rejects_pending_clears_targets_and_closes_clients() {
	let hub = hub();
	let link = hub.connect_extension().await.unwrap();
	let mut client = hub.connect_client(None).await.unwrap();
	hub.handle_extension_message(&attach_event("S1", "T1", "Home")).await.unwrap();

	let call = tokio::spawn({
		let hub = hub.clone();
		async move { hub.send_command("Page.reload", json!({}), Some("S1")).await }
	});
	while hub.pending_count().await == 0 {
		tokio::task::yield_now().await;
	}

	hub.disconnect_extension(link.generation).await;

	assert!(matches!(call.await.unwrap(), Err(BridgeError::ExtensionDisconnected)));
	assert_eq!(hub.pending_count().await, 0);
	assert!(hub.connected_targets().await.is_empty());
	assert_eq!(hub.client_count().await, 0);
	assert_eq!(drain(&mut client.outbound).last(), Some(&Outbound::Close));
}

#[tokio::test]
async fn attach_registers_target_from_event_params() {
	let hub = hub();
	let _link = hub.connect_extension().await.unwrap();
	let mut client = hub.connect_client(None).await.unwrap();

	hub.handle_extension_message(&attach_event("S1", "T1", "Home")).await.unwrap();

	let targets = hub.connected_targets().await;
	assert_eq!(targets.len(), 1);
	assert_eq!(targets[0].session_id, "S1");
	assert_eq!(targets[0].target_id, "T1");
	assert_eq!(hub.session_for_target("T1").await.as_deref(), Some("S1"));
	assert_eq!(hub.session_for_target("S1").await.as_deref(), Some("S1"));
	assert_eq!(hub.session_for_target("T9").await, None);

	let tabs = hub.tabs().await;
	assert_eq!(tabs[0].id, "T1");
	assert_eq!(tabs[0].title, "Home");

	let event = next_json(&mut client.outbound);
	assert_eq!(event["method"], "Target.attachedToTarget");
	assert_eq!(event["params"]["sessionId"], "S1");
}

#[tokio::test]
async fn reattach_of_same_target_refreshes_without_rebroadcast() {
	let hub = hub();
	let _link = hub.connect_extension().await.unwrap();
	let mut client = hub.connect_client(None).await.unwrap();

	hub.handle_extension_message(&attach_event("S1", "T1", "Home")).await.unwrap();
	hub.handle_extension_message(&attach_event("S1", "T1", "Home - updated")).await.unwrap();

	assert_eq!(drain(&mut client.outbound).len(), 1);
	assert_eq!(hub.tabs().await[0].title, "Home - updated");
}

#[tokio::test]
async fn session_reused_for_new_target_detaches_old_one_first() {
	let hub = hub();
	let _link = hub.connect_extension().await.unwrap();
	let mut client = hub.connect_client(None).await.unwrap();

	hub.handle_extension_message(&attach_event("S1", "T1", "Old")).await.unwrap();
	hub.handle_extension_message(&attach_event("S1", "T2", "New")).await.unwrap();

	let first = next_json(&mut client.outbound);
	let detach = next_json(&mut client.outbound);
	let second = next_json(&mut client.outbound);
	assert_eq!(first["params"]["targetInfo"]["targetId"], "T1");
	assert_eq!(detach["method"], "Target.detachedFromTarget");
	assert_eq!(detach["params"]["targetId"], "T1");
	assert_eq!(detach["params"]["sessionId"], "S1");
	assert_eq!(second["params"]["targetInfo"]["targetId"], "T2");

	let targets = hub.connected_targets().await;
	assert_eq!(targets.len(), 1);
	assert_eq!(targets[0].target_id, "T2");
}

#[tokio::test]
async fn late_detach_for_replaced_target_keeps_live_one() {
	let hub = hub();
	let _link = hub.connect_extension().await.unwrap();
	let mut client = hub.connect_client(None).await.unwrap();

	hub.handle_extension_message(&attach_event("S1", "T1", "Old")).await.unwrap();
	hub.handle_extension_message(&attach_event("S1", "T2", "New")).await.unwrap();
	drain(&mut client.outbound);

	hub.handle_extension_message(&forwarded(
		"Target.detachedFromTarget",
		json!({ "sessionId": "S1", "targetId": "T1" }),
	))
	.await
	.unwrap();

	assert!(drain(&mut client.outbound).is_empty());
	let tabs = hub.tabs().await;
	assert_eq!(tabs.len(), 1);
	assert_eq!(tabs[0].id, "T2");

	hub.handle_extension_message(&forwarded("Target.detachedFromTarget", json!({ "sessionId": "S1" })))
		.await
		.unwrap();
	assert!(hub.tabs().await.is_empty());
	assert_eq!(next_json(&mut client.outbound)["method"], "Target.detachedFromTarget");
}

#[tokio::test]
async fn detach_and_info_change_update_registry() {
	let hub = hub();
	let _link = hub.connect_extension().await.unwrap();

	hub.handle_extension_message(&attach_event("S1", "T1", "Home")).await.unwrap();
	hub.handle_extension_message(&attach_event("S2", "T2", "Docs")).await.unwrap();
	hub.handle_extension_message(&forwarded(
		"Target.targetInfoChanged",
		json!({ "targetInfo": { "targetId": "T2", "type": "page", "title": "Docs v2", "url": "https://docs.test/" } }),
	))
	.await
	.unwrap();
	hub.handle_extension_message(&forwarded(
		"Target.detachedFromTarget",
		json!({ "sessionId": "S1", "targetId": "T1" }),
	))
	.await
	.unwrap();

	let tabs = hub.tabs().await;
	assert_eq!(tabs.len(), 1);
	assert_eq!(tabs[0].id, "T2");
	assert_eq!(tabs[0].title, "Docs v2");
	assert_eq!(tabs[0].url, "https://docs.test/");
}

#[tokio::test]
async fn session_scoped_events_keep_their_session() {
	let hub = hub();
	let _link = hub.connect_extension().await.unwrap();
	let mut client = hub.connect_client(Some("pw".into())).await.unwrap();

	let frame = json!({
		"method": "forwardCDPEvent",
		"params": { "method": "Page.loadEventFired", "sessionId": "S1", "params": { "timestamp": 1.5 } },
	});
	hub.handle_extension_message(&frame.to_string()).await.unwrap();

	let event = next_json(&mut client.outbound);
	assert_eq!(event["method"], "Page.loadEventFired");
	assert_eq!(event["sessionId"], "S1");
	assert_eq!(event["params"]["timestamp"], 1.5);
}

#[tokio::test]
async fn clients_require_an_extension() {
	let hub = hub();
	assert!(hub.connect_client(None).await.is_none());

	let _link = hub.connect_extension().await.unwrap();
	let a = hub.connect_client(None).await.unwrap();
	let b = hub.connect_client(None).await.unwrap();
	assert_ne!(a.client_id, b.client_id);
	assert_eq!(hub.client_count().await, 2);

	hub.disconnect_client(&a.client_id, a.connection).await;
	assert_eq!(hub.client_count().await, 1);
}

#[tokio::test]
async fn reused_client_id_closes_previous_holder() {
	let hub = hub();
	let _link = hub.connect_extension().await.unwrap();
	let mut first = hub.connect_client(Some("pw".into())).await.unwrap();
	let second = hub.connect_client(Some("pw".into())).await.unwrap();

	assert_eq!(first.outbound.try_recv().ok(), Some(Outbound::Close));
	assert_eq!(hub.client_count().await, 1);

	// The old socket closing later must not evict the new holder.
	hub.disconnect_client("pw", first.connection).await;
	assert_eq!(hub.client_count().await, 1);
	hub.disconnect_client("pw", second.connection).await;
	assert_eq!(hub.client_count().await, 0);
}

#[tokio::test]
async fn auto_attach_is_answered_locally_then_replayed() {
	let hub = hub();
	let _link = hub.connect_extension().await.unwrap();
	let mut client = hub.connect_client(None).await.unwrap();
	hub.handle_extension_message(&attach_event("S1", "T1", "Home")).await.unwrap();
	drain(&mut client.outbound);

	hub.handle_client_message(
		&client.client_id,
		r#"{"id": 7, "method": "Target.setAutoAttach", "params": {"autoAttach": true, "flatten": true}}"#,
	)
	.await
	.unwrap();

	let reply = next_json(&mut client.outbound);
	assert_eq!(reply["id"], 7);
	assert_eq!(reply["result"], json!({}));
	let replay = next_json(&mut client.outbound);
	assert_eq!(replay["method"], "Target.attachedToTarget");
	assert_eq!(replay["params"]["sessionId"], "S1");
}

#[tokio::test]
async fn session_command_is_forwarded_through_extension() {
	let hub = hub();
	let link = hub.connect_extension().await.unwrap();
	spawn_fake_extension(hub.clone(), link);
	let mut client = hub.connect_client(None).await.unwrap();

	hub.handle_client_message(
		&client.client_id,
		r#"{"id": 3, "method": "DOM.getDocument", "params": {"depth": 1}, "sessionId": "S1"}"#,
	)
	.await
	.unwrap();

	let reply = next_json(&mut client.outbound);
	assert_eq!(reply["id"], 3);
	assert_eq!(reply["sessionId"], "S1");
	assert_eq!(reply["result"]["method"], "DOM.getDocument");
	assert_eq!(reply["result"]["sessionId"], "S1");
}

#[tokio::test]
async fn failed_forward_becomes_error_reply() {
	let hub = hub();
	let link = hub.connect_extension().await.unwrap();
	let mut client = hub.connect_client(None).await.unwrap();
	drop(link);

	hub.handle_client_message(&client.client_id, r#"{"id": 4, "method": "Page.reload"}"#)
		.await
		.unwrap();

	let reply = next_json(&mut client.outbound);
	assert_eq!(reply["id"], 4);
	assert_eq!(reply["error"]["message"], "extension disconnected");
}

#[tokio::test]
async fn malformed_client_command_is_rejected() {
	let hub = hub();
	let _link = hub.connect_extension().await.unwrap();
	let client = hub.connect_client(None).await.unwrap();

	assert!(hub.handle_client_message(&client.client_id, r#"{"method": "x"}"#).await.is_err());
}

#[tokio::test]
async fn log_pong_and_unknown_frames_are_accepted() {
	let hub = hub();
	hub.handle_extension_message(r#"{"method": "log", "params": {"level": "info", "args": ["hello", 1]}}"#)
		.await
		.unwrap();
	hub.handle_extension_message(r#"{"method": "pong"}"#).await.unwrap();
	hub.handle_extension_message(r#"{"method": "somethingElse"}"#).await.unwrap();
	assert!(hub.handle_extension_message("not json").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn heartbeat_pings_until_extension_leaves() {
	let hub = hub();
	let mut link = hub.connect_extension().await.unwrap();
	let heartbeat = hub.spawn_heartbeat(link.generation);

	tokio::time::sleep(Duration::from_millis(5_001)).await;
	assert_eq!(next_json(&mut link.outbound), json!({"method": "ping"}));

	hub.disconnect_extension(link.generation).await;
	tokio::time::timeout(Duration::from_secs(10), heartbeat)
		.await
		.unwrap()
		.unwrap();
}

#[tokio::test]
async fn discovery_lists_attached_pages_behind_the_relay() {
	let hub = hub();
	let _link = hub.connect_extension().await.unwrap();
	hub.handle_extension_message(&attach_event("S1", "T1", "Home")).await.unwrap();

	let version = hub.discovery_version("ws://127.0.0.1:18792/cdp");
	assert_eq!(version.protocol_version, "1.3");
	assert_eq!(version.web_socket_debugger_url, "ws://127.0.0.1:18792/cdp");

	let pages = hub.discovery_targets("ws://127.0.0.1:18792/cdp").await;
	assert_eq!(pages.len(), 1);
	assert_eq!(pages[0].id, "T1");
	assert!(pages[0].is_page());
	assert_eq!(pages[0].title, "Home");
	assert_eq!(pages[0].web_socket_debugger_url.as_deref(), Some("ws://127.0.0.1:18792/cdp"));
}
