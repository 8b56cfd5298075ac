use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bridge_protocol::{
	BotChannelStatus, BrowserStatus, ChannelHint, DialogAction, ElementMatch, FillResult, NavigateAction,
	NavigateResult, Screenshot, ScrollDirection, SnapshotResult, Tab, UserChannelStatus,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::actions::{
	ClickOptions, ClickTarget, DEFAULT_SCROLL_AMOUNT, DEFAULT_WAIT_TIMEOUT_MS, ScreenshotOptions, SnapshotOptions,
	TabHandle,
};
use crate::channel::{BotBrowser, BrowserChannel, Channel, ExtensionChannel, select_channel};
use crate::config::{ActionTiming, BridgeConfig};
use crate::error::{BridgeError, Result};
use crate::relay::RelayHub;

/// Entry point for every browser action.
///
/// Each call takes an optional [`ChannelHint`]; the channel is chosen per call
/// from the hint and whether an extension is connected at that moment.
#[derive(Clone)]
pub struct Bridge {
	hub: RelayHub,
	extension: ExtensionChannel,
	bot: Arc<BotBrowser>,
	timing: ActionTiming,
}

impl Bridge {
	pub fn new(config: &BridgeConfig) -> Self {
		Self::from_parts(
			RelayHub::new(config.relay.clone()),
			BotBrowser::from_config(&config.bot),
			config.timing,
		)
	}

	pub fn from_parts(hub: RelayHub, bot: BotBrowser, timing: ActionTiming) -> Self {
		Self {
			extension: ExtensionChannel::new(hub.clone()),
			hub,
			bot: Arc::new(bot),
			timing,
		}
	}

	pub fn hub(&self) -> &RelayHub {
		&self.hub
	}

	pub fn bot(&self) -> &BotBrowser {
		&self.bot
	}

	pub async fn select(&self, hint: Option<ChannelHint>) -> Result<Channel> {
		select_channel(hint, self.hub.is_extension_connected().await)
	}

	async fn channel(&self, hint: Option<ChannelHint>) -> Result<&dyn BrowserChannel> {
		let channel: &dyn BrowserChannel = match self.select(hint).await? {
			Channel::Extension => &self.extension,
			Channel::Bot => self.bot.as_ref(),
		};
		Ok(channel)
	}

	async fn tab<'a>(&'a self, hint: Option<ChannelHint>, tab_id: &'a str, action: &str) -> Result<TabHandle<'a>> {
		let channel = self.channel(hint).await?;
		debug!(target = "bridge.actions", action, channel = channel.kind().as_str(), tab = tab_id, "dispatching");
		Ok(TabHandle::new(channel, tab_id, self.timing))
	}

	/// Both channels, queried independently. Never launches a browser; a
	/// channel that errors is reported as disconnected or not running.
	pub async fn get_status(&self) -> BrowserStatus {
		let connected = self.hub.is_extension_connected().await;
		let user = UserChannelStatus {
			connected,
			tabs: if connected { self.hub.tabs().await } else { Vec::new() },
		};

		let bot = match self.bot.tabs().await {
			Ok(tabs) => BotChannelStatus { running: true, tabs },
			Err(err) => {
				debug!(target = "bridge.status", port = self.bot.port(), error = %err, "bot browser not reachable");
				BotChannelStatus::default()
			}
		};

		BrowserStatus { user, bot }
	}

	pub async fn launch_bot_browser(&self, headless: Option<bool>, url: Option<&str>) -> Result<String> {
		let message = self.bot.launch(headless, url).await?;
		info!(target = "bridge.bot", %message, "launch requested");
		Ok(message)
	}

	pub async fn list_tabs(&self, hint: Option<ChannelHint>) -> Result<Vec<Tab>> {
		self.channel(hint).await?.list_tabs().await
	}

	pub async fn snapshot(
		&self,
		hint: Option<ChannelHint>,
		tab_id: &str,
		options: &SnapshotOptions,
	) -> Result<SnapshotResult> {
		self.tab(hint, tab_id, "snapshot").await?.snapshot(options).await
	}

	pub async fn find_elements(
		&self,
		hint: Option<ChannelHint>,
		tab_id: &str,
		query: &str,
	) -> Result<Vec<ElementMatch>> {
		self.tab(hint, tab_id, "find").await?.find_elements(query).await
	}

	pub async fn click_element(
		&self,
		hint: Option<ChannelHint>,
		tab_id: &str,
		target: &ClickTarget,
		options: ClickOptions,
	) -> Result<()> {
		self.tab(hint, tab_id, "click").await?.click(target, options).await
	}

	pub async fn fill_form(
		&self,
		hint: Option<ChannelHint>,
		tab_id: &str,
		reference: &str,
		value: &str,
	) -> Result<FillResult> {
		self.tab(hint, tab_id, "fill").await?.fill(reference, value).await
	}

	pub async fn press_key(&self, hint: Option<ChannelHint>, tab_id: &str, key: &str) -> Result<()> {
		self.tab(hint, tab_id, "press").await?.press_key(key).await
	}

	/// `amount` defaults to [`DEFAULT_SCROLL_AMOUNT`] pixels.
	pub async fn scroll(
		&self,
		hint: Option<ChannelHint>,
		tab_id: &str,
		direction: ScrollDirection,
		amount: Option<f64>,
		reference: Option<&str>,
	) -> Result<()> {
		let amount = amount.unwrap_or(DEFAULT_SCROLL_AMOUNT);
		if !amount.is_finite() || amount < 0.0 {
			return Err(BridgeError::InvalidInput(format!("invalid scroll amount: {amount}")));
		}
		self.tab(hint, tab_id, "scroll")
			.await?
			.scroll(direction, amount, reference)
			.await
	}

	/// `timeout_ms` defaults to [`DEFAULT_WAIT_TIMEOUT_MS`].
	pub async fn wait_for_text(
		&self,
		hint: Option<ChannelHint>,
		tab_id: &str,
		text: &str,
		timeout_ms: Option<u64>,
	) -> Result<bool> {
		let timeout = Duration::from_millis(timeout_ms.unwrap_or(DEFAULT_WAIT_TIMEOUT_MS));
		self.tab(hint, tab_id, "wait").await?.wait_for_text(text, timeout).await
	}

	pub async fn handle_dialog(
		&self,
		hint: Option<ChannelHint>,
		tab_id: &str,
		action: DialogAction,
		prompt_text: Option<&str>,
	) -> Result<()> {
		self.tab(hint, tab_id, "dialog")
			.await?
			.handle_dialog(action, prompt_text)
			.await
	}

	pub async fn upload_file(
		&self,
		hint: Option<ChannelHint>,
		tab_id: &str,
		reference: &str,
		file_path: &Path,
	) -> Result<()> {
		self.tab(hint, tab_id, "upload")
			.await?
			.upload_file(reference, file_path)
			.await
	}

	pub async fn screenshot(
		&self,
		hint: Option<ChannelHint>,
		tab_id: &str,
		options: ScreenshotOptions,
	) -> Result<Screenshot> {
		self.tab(hint, tab_id, "screenshot").await?.screenshot(options).await
	}

	pub async fn navigate(
		&self,
		hint: Option<ChannelHint>,
		tab_id: &str,
		action: NavigateAction,
		url: Option<&str>,
	) -> Result<NavigateResult> {
		self.tab(hint, tab_id, "navigate").await?.navigate(action, url).await
	}

	pub async fn evaluate(&self, hint: Option<ChannelHint>, tab_id: &str, expression: &str) -> Result<Value> {
		self.tab(hint, tab_id, "evaluate").await?.evaluate(expression).await
	}

	/// Runs a tool implemented by the extension itself. User channel only.
	pub async fn call_extension_tool(&self, name: &str, args: Value, tab_id: Option<&str>) -> Result<Value> {
		if !self.hub.is_extension_connected().await {
			return Err(BridgeError::ChannelUnavailable(format!(
				"extension tool {name} requires a connected browser extension"
			)));
		}
		debug!(target = "bridge.actions", tool = name, tab = ?tab_id, "calling extension tool");
		self.hub.call_tool(name, args, tab_id).await.inspect_err(|err| {
			warn!(target = "bridge.actions", tool = name, error = %err, "extension tool failed");
		})
	}
}

#[cfg(test)]
mod tests {
	use std::net::TcpListener;

	use serde_json::json;

	use super::*;
	use crate::config::BotConfig;
	use crate::relay::{ExtensionLink, Outbound};

	/// A bot channel pointed at a port nothing listens on, with a browser
	/// executable that cannot start.
	fn offline_config() -> BridgeConfig {
		let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
		BridgeConfig {
			bot: BotConfig {
				port,
				executable: Some("/nonexistent/browser".into()),
				launch_timeout_ms: 200,
				..Default::default()
			},
			..Default::default()
		}
	}

	/// Answers `Runtime.evaluate` with the number 2 and tools with their args.
	fn spawn_extension(hub: RelayHub, mut link: ExtensionLink) {
		tokio::spawn(async move {
			while let Some(Outbound::Text(text)) = link.outbound.recv().await {
				let request: Value = serde_json::from_str(&text).unwrap();
				let Some(id) = request["id"].as_u64() else { continue };
				let result = match request["method"].as_str() {
					Some("executeTool") => json!({ "tool": request["params"]["name"], "args": request["params"]["args"] }),
					_ => json!({ "result": { "type": "number", "value": 2 } }),
				};
				let reply = json!({ "id": id, "result": result });
				hub.handle_extension_message(&reply.to_string()).await.unwrap();
			}
		});
	}

	async fn attach(hub: &RelayHub, session_id: &str, target_id: &str) {
		let event = json!({
			"method": "forwardCDPEvent",
			"params": {
				"method": "Target.attachedToTarget",
				"params": {
					"sessionId": session_id,
					"targetInfo": { "targetId": target_id, "type": "page", "title": "Inbox", "url": "https://mail.test/" },
				},
			},
		});
		hub.handle_extension_message(&event.to_string()).await.unwrap();
	}

	#[tokio::test]
	async fn status_with_nothing_running() {
		let bridge = Bridge::new(&offline_config());
		assert_eq!(bridge.get_status().await, BrowserStatus::default());
	}

	#[tokio::test]
	async fn status_reports_extension_tabs_and_missing_bot() {
		let bridge = Bridge::new(&offline_config());
		let _link = bridge.hub().connect_extension().await.unwrap();
		attach(bridge.hub(), "S1", "T1").await;

		let status = bridge.get_status().await;
		assert!(status.user.connected);
		assert_eq!(status.user.tabs.len(), 1);
		assert_eq!(status.user.tabs[0].id, "T1");
		assert_eq!(status.user.tabs[0].session_id.as_deref(), Some("S1"));
		assert!(!status.bot.running);
		assert!(status.bot.tabs.is_empty());
	}

	#[tokio::test]
	async fn channel_selection_follows_the_extension() {
		let bridge = Bridge::new(&offline_config());
		assert_eq!(bridge.select(None).await.unwrap(), Channel::Bot);
		assert!(matches!(
			bridge.select(Some(ChannelHint::User)).await,
			Err(BridgeError::ChannelUnavailable(_))
		));

		let _link = bridge.hub().connect_extension().await.unwrap();
		assert_eq!(bridge.select(None).await.unwrap(), Channel::Extension);
		assert_eq!(bridge.select(Some(ChannelHint::Bot)).await.unwrap(), Channel::Bot);
	}

	#[tokio::test]
	async fn forced_user_channel_without_extension_is_unavailable() {
		let bridge = Bridge::new(&offline_config());
		let err = bridge
			.evaluate(Some(ChannelHint::User), "T1", "document.title")
			.await
			.unwrap_err();
		assert_eq!(err.code(), "CHANNEL_UNAVAILABLE");
	}

	#[tokio::test]
	async fn evaluate_runs_through_the_extension() {
		let bridge = Bridge::new(&offline_config());
		let link = bridge.hub().connect_extension().await.unwrap();
		attach(bridge.hub(), "S1", "T1").await;
		spawn_extension(bridge.hub().clone(), link);

		let value = bridge.evaluate(None, "T1", "1 + 1").await.unwrap();
		assert_eq!(value, json!(2));

		let err = bridge.evaluate(None, "T9", "1 + 1").await.unwrap_err();
		assert!(matches!(err, BridgeError::TargetNotFound(ref id) if id == "T9"));
	}

	#[tokio::test]
	async fn extension_tools_need_the_extension() {
		let bridge = Bridge::new(&offline_config());
		let err = bridge
			.call_extension_tool("tabs_context", json!({}), None)
			.await
			.unwrap_err();
		assert!(matches!(err, BridgeError::ChannelUnavailable(_)));

		let link = bridge.hub().connect_extension().await.unwrap();
		spawn_extension(bridge.hub().clone(), link);
		let result = bridge
			.call_extension_tool("read_console", json!({ "limit": 5 }), Some("T1"))
			.await
			.unwrap();
		assert_eq!(result, json!({ "tool": "read_console", "args": { "limit": 5 } }));
	}

	#[tokio::test]
	async fn bot_tabs_fail_when_nothing_listens() {
		let bridge = Bridge::new(&offline_config());
		let err = bridge.list_tabs(Some(ChannelHint::Bot)).await.unwrap_err();
		assert_eq!(err.code(), "CHANNEL_UNAVAILABLE");
	}

	#[tokio::test]
	async fn negative_scroll_amount_is_rejected() {
		let bridge = Bridge::new(&offline_config());
		let err = bridge
			.scroll(None, "T1", ScrollDirection::Down, Some(-5.0), None)
			.await
			.unwrap_err();
		assert!(matches!(err, BridgeError::InvalidInput(_)));
	}
}
