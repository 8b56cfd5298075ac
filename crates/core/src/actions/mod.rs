//! Channel-agnostic page actions.
//!
//! [`TabHandle`] binds a [`BrowserChannel`] to one tab; every action is a
//! short sequence of CDP commands sent through it, so the same code drives the
//! user's browser and the bot browser.
//!
//! # Main Types
//!
//! - [`TabHandle`] - a tab on a channel, plus action timing
//! - [`ClickTarget`] / [`ClickOptions`] - what and how to click
//! - [`SnapshotOptions`] / [`ScreenshotOptions`] - capture parameters
//! - [`keys::KeyCombo`] - a parsed `Control+Shift+R` style combination

mod capture;
mod content;
mod input;
pub mod keys;
mod navigation;
mod refs;

use bridge_protocol::{MouseButton, ScreenshotFormat, SnapshotFilter};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::channel::BrowserChannel;
use crate::config::ActionTiming;
use crate::error::{BridgeError, Result};

pub const DEFAULT_SCROLL_AMOUNT: f64 = 300.0;
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;
pub const MAX_FIND_RESULTS: usize = 20;
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone, PartialEq)]
pub enum ClickTarget {
	Ref(String),
	Point { x: f64, y: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickOptions {
	pub button: MouseButton,
	/// Number of press/release pairs; `2` is a double click.
	pub click_count: u32,
}

impl Default for ClickOptions {
	fn default() -> Self {
		Self {
			button: MouseButton::Left,
			click_count: 1,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotOptions {
	pub depth: Option<u32>,
	pub filter: SnapshotFilter,
	/// Root the outline at this element instead of `document.body`.
	pub reference: Option<String>,
	pub max_chars: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScreenshotOptions {
	pub format: ScreenshotFormat,
	/// JPEG only; ignored for PNG.
	pub quality: Option<u8>,
	pub full_page: bool,
}

/// One tab on one channel.
pub struct TabHandle<'a> {
	channel: &'a dyn BrowserChannel,
	tab_id: &'a str,
	timing: ActionTiming,
}

impl<'a> TabHandle<'a> {
	pub fn new(channel: &'a dyn BrowserChannel, tab_id: &'a str, timing: ActionTiming) -> Self {
		Self {
			channel,
			tab_id,
			timing,
		}
	}

	pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
		self.channel.send_to_tab(self.tab_id, method, params).await
	}

	/// Evaluates `expression` in the page and returns its value by value.
	///
	/// Promises are awaited. A thrown exception becomes
	/// [`BridgeError::UpstreamProtocol`] carrying the browser's description.
	pub async fn evaluate(&self, expression: &str) -> Result<Value> {
		let response = self
			.send(
				"Runtime.evaluate",
				json!({
					"expression": expression,
					"returnByValue": true,
					"awaitPromise": true,
				}),
			)
			.await?;

		if let Some(details) = response.get("exceptionDetails") {
			return Err(BridgeError::UpstreamProtocol(exception_message(details)));
		}
		Ok(response["result"]["value"].clone())
	}

	pub(crate) async fn evaluate_as<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
		let value = self.evaluate(expression).await?;
		Ok(serde_json::from_value(value)?)
	}
}

fn exception_message(details: &Value) -> String {
	details["exception"]["description"]
		.as_str()
		.or_else(|| details["text"].as_str())
		.unwrap_or("script threw an exception")
		.to_string()
}
