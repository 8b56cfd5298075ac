use async_trait::async_trait;
use bridge_protocol::Tab;
use serde_json::Value;

use super::{BrowserChannel, Channel};
use crate::error::{BridgeError, Result};
use crate::relay::RelayHub;

/// The user's browser, reached through the extension attached to the hub.
#[derive(Clone)]
pub struct ExtensionChannel {
	hub: RelayHub,
}

impl ExtensionChannel {
	pub fn new(hub: RelayHub) -> Self {
		Self { hub }
	}
}

#[async_trait]
impl BrowserChannel for ExtensionChannel {
	fn kind(&self) -> Channel {
		Channel::Extension
	}

	async fn list_tabs(&self) -> Result<Vec<Tab>> {
		if !self.hub.is_extension_connected().await {
			return Err(BridgeError::ExtensionDisconnected);
		}
		Ok(self.hub.tabs().await)
	}

	async fn send_to_tab(&self, tab_id: &str, method: &str, params: Value) -> Result<Value> {
		let session_id = self
			.hub
			.session_for_target(tab_id)
			.await
			.ok_or_else(|| BridgeError::TargetNotFound(tab_id.to_string()))?;
		self.hub.send_command(method, params, Some(&session_id)).await
	}

	async fn send_to_browser(&self, method: &str, params: Value) -> Result<Value> {
		self.hub.send_command(method, params, None).await
	}
}
