//! Decides how the relay answers a client's CDP command.
//!
//! Browser- and target-level bookkeeping is answered from the relay's own
//! registry so clients see only the tabs the extension attached. Everything
//! else goes to the extension.

use std::collections::BTreeMap;

use bridge_protocol::ClientCommand;
use serde_json::{Value, json};

use super::ConnectedTarget;

pub(super) const PROTOCOL_VERSION: &str = "1.3";
pub(super) const PRODUCT: &str = "Chrome/Extension-Bridge";
pub(super) const USER_AGENT: &str = concat!("Browser-Bridge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, PartialEq)]
pub(super) enum Route {
	/// Reply locally, then send `follow_up` events to the same client.
	Answer { result: Value, follow_up: Vec<Value> },
	Fail(String),
	Forward { session_id: Option<String> },
}

impl Route {
	fn answer(result: Value) -> Self {
		Route::Answer {
			result,
			follow_up: Vec::new(),
		}
	}
}

pub(super) fn browser_version() -> Value {
	json!({
		"protocolVersion": PROTOCOL_VERSION,
		"product": PRODUCT,
		"revision": env!("CARGO_PKG_VERSION"),
		"userAgent": USER_AGENT,
		"jsVersion": "V8",
	})
}

pub(super) fn route_command(targets: &BTreeMap<String, ConnectedTarget>, command: &ClientCommand) -> Route {
	let params = &command.params;
	let session_id = command.session_id.as_deref();

	match command.method.as_str() {
		"Browser.getVersion" => Route::answer(browser_version()),
		"Browser.setDownloadBehavior" => Route::answer(json!({})),
		"Target.setAutoAttach" if session_id.is_none() => Route::Answer {
			result: json!({}),
			follow_up: targets
				.values()
				.map(|t| {
					json!({
						"method": "Target.attachedToTarget",
						"params": {
							"sessionId": t.session_id,
							"targetInfo": t.target_info,
							"waitingForDebugger": false,
						},
					})
				})
				.collect(),
		},
		"Target.setDiscoverTargets" => {
			let follow_up = if params["discover"].as_bool().unwrap_or(false) {
				targets
					.values()
					.map(|t| json!({ "method": "Target.targetCreated", "params": { "targetInfo": t.target_info } }))
					.collect()
			} else {
				Vec::new()
			};
			Route::Answer {
				result: json!({}),
				follow_up,
			}
		}
		"Target.attachToTarget" => {
			let Some(target_id) = params["targetId"].as_str() else {
				return Route::Fail("targetId is required for Target.attachToTarget".into());
			};
			match targets.values().find(|t| t.target_id == target_id) {
				Some(target) => Route::answer(json!({ "sessionId": target.session_id })),
				None => Route::Fail(format!("Target not found: {target_id}")),
			}
		}
		"Target.getTargetInfo" => {
			let by_target = params["targetId"]
				.as_str()
				.and_then(|id| targets.values().find(|t| t.target_id == id));
			let by_session = session_id.and_then(|sid| targets.get(sid));
			let info = by_target
				.or(by_session)
				.or_else(|| targets.values().next())
				.map(|t| t.target_info.clone());
			Route::answer(json!({ "targetInfo": info }))
		}
		"Target.getTargets" => {
			let infos: Vec<Value> = targets
				.values()
				.map(|t| {
					let mut info = t.target_info.clone();
					if let Some(obj) = info.as_object_mut() {
						obj.insert("attached".to_string(), Value::Bool(true));
					}
					info
				})
				.collect();
			Route::answer(json!({ "targetInfos": infos }))
		}
		// Tab creation and closing are browser-level; the extension owns them.
		"Target.createTarget" | "Target.closeTarget" => Route::Forward { session_id: None },
		_ => Route::Forward {
			session_id: command.session_id.clone(),
		},
	}
}
