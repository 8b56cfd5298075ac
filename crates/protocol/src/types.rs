//! Channel-agnostic data model returned by the bridge.

use serde::{Deserialize, Serialize};

/// One debuggable page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
	/// Target id assigned by the browser.
	pub id: String,
	/// Relay session bound to this target; only present on the user channel.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
	pub title: String,
	pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserChannelStatus {
	pub connected: bool,
	pub tabs: Vec<Tab>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotChannelStatus {
	pub running: bool,
	pub tabs: Vec<Tab>,
}

/// Snapshot of both channels, computed per query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserStatus {
	pub user: UserChannelStatus,
	pub bot: BotChannelStatus,
}

/// Caller preference for which channel handles an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelHint {
	/// The user's own browser, through the extension
	User,
	/// A bridge-managed browser process
	Bot,
}

impl std::str::FromStr for ChannelHint {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"user" | "extension" => Ok(ChannelHint::User),
			"bot" => Ok(ChannelHint::Bot),
			_ => Err(format!("unknown channel: {s}")),
		}
	}
}

/// Mouse button for click actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
	#[default]
	Left,
	Right,
	Middle,
}

impl MouseButton {
	pub fn as_cdp(self) -> &'static str {
		match self {
			MouseButton::Left => "left",
			MouseButton::Right => "right",
			MouseButton::Middle => "middle",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
	Up,
	Down,
	Left,
	Right,
}

impl ScrollDirection {
	/// Wheel deltas for scrolling `amount` pixels in this direction.
	pub fn deltas(self, amount: f64) -> (f64, f64) {
		match self {
			ScrollDirection::Up => (0.0, -amount),
			ScrollDirection::Down => (0.0, amount),
			ScrollDirection::Left => (-amount, 0.0),
			ScrollDirection::Right => (amount, 0.0),
		}
	}
}

/// Screenshot image format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotFormat {
	#[default]
	Png,
	Jpeg,
}

impl ScreenshotFormat {
	pub fn as_cdp(self) -> &'static str {
		match self {
			ScreenshotFormat::Png => "png",
			ScreenshotFormat::Jpeg => "jpeg",
		}
	}

	pub fn mime_type(self) -> &'static str {
		match self {
			ScreenshotFormat::Png => "image/png",
			ScreenshotFormat::Jpeg => "image/jpeg",
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigateAction {
	#[default]
	Goto,
	Back,
	Forward,
	Reload,
	NewTab,
	CloseTab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogAction {
	Accept,
	Dismiss,
}

/// Which nodes the accessibility snapshot keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFilter {
	#[default]
	All,
	Interactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResult {
	pub title: String,
	pub url: String,
	pub snapshot: String,
	#[serde(default)]
	pub truncated: bool,
}

/// A single ranked match from element search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementMatch {
	#[serde(rename = "ref")]
	pub reference: String,
	pub role: String,
	#[serde(default)]
	pub name: String,
	pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillResult {
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub element_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
	/// Base64-encoded image bytes.
	pub data: String,
	pub mime_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateResult {
	/// Id of the tab opened by `new_tab`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tab_id: Option<String>,
}
