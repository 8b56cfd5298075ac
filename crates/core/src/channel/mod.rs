//! The two ways the bridge reaches a browser.
//!
//! * [`ExtensionChannel`] - the user's own browser, through the relay hub
//! * [`BotBrowser`] - a bridge-managed browser on a local debugging port
//!
//! Actions are written once against [`BrowserChannel`] and never care which
//! one they run on.

mod bot;
mod extension;

use async_trait::async_trait;
use bridge_protocol::{ChannelHint, Tab};
use serde_json::Value;

pub use self::bot::BotBrowser;
pub use self::extension::ExtensionChannel;
use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
	Extension,
	Bot,
}

impl Channel {
	pub fn as_str(self) -> &'static str {
		match self {
			Channel::Extension => "user",
			Channel::Bot => "bot",
		}
	}
}

/// Picks the channel for one call.
///
/// A `user` hint requires a connected extension; `bot` always resolves to the
/// bot browser. Without a hint the user channel wins whenever the extension is
/// connected.
pub fn select_channel(hint: Option<ChannelHint>, extension_connected: bool) -> Result<Channel> {
	match hint {
		Some(ChannelHint::User) if extension_connected => Ok(Channel::Extension),
		Some(ChannelHint::User) => Err(BridgeError::ChannelUnavailable(
			"user channel requested but no browser extension is connected".into(),
		)),
		Some(ChannelHint::Bot) => Ok(Channel::Bot),
		None if extension_connected => Ok(Channel::Extension),
		None => Ok(Channel::Bot),
	}
}

/// A CDP-speaking browser reachable by tab.
#[async_trait]
pub trait BrowserChannel: Send + Sync {
	fn kind(&self) -> Channel;

	async fn list_tabs(&self) -> Result<Vec<Tab>>;

	/// Sends a command scoped to one tab.
	async fn send_to_tab(&self, tab_id: &str, method: &str, params: Value) -> Result<Value>;

	/// Sends a browser-level command (tab creation, closing).
	async fn send_to_browser(&self, method: &str, params: Value) -> Result<Value>;
}
