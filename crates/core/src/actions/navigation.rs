use bridge_protocol::{NavigateAction, NavigateResult};
use serde_json::json;

use super::TabHandle;
use crate::error::{BridgeError, Result};

impl TabHandle<'_> {
	/// `new_tab` and `close_tab` are browser-level and go through the
	/// channel's browser target; the rest act on this tab.
	pub async fn navigate(&self, action: NavigateAction, url: Option<&str>) -> Result<NavigateResult> {
		match action {
			NavigateAction::Goto => {
				let url = url.ok_or_else(|| BridgeError::InvalidInput("url is required for goto".into()))?;
				let result = self.send("Page.navigate", json!({ "url": url })).await?;
				if let Some(error) = result["errorText"].as_str().filter(|e| !e.is_empty()) {
					return Err(BridgeError::UpstreamProtocol(error.to_string()));
				}
			}
			NavigateAction::Back => self.step_history(-1).await?,
			NavigateAction::Forward => self.step_history(1).await?,
			NavigateAction::Reload => {
				self.send("Page.reload", json!({})).await?;
			}
			NavigateAction::NewTab => {
				let result = self
					.channel
					.send_to_browser("Target.createTarget", json!({ "url": url.unwrap_or("about:blank") }))
					.await?;
				let tab_id = result["targetId"]
					.as_str()
					.ok_or_else(|| BridgeError::UpstreamProtocol("Target.createTarget returned no targetId".into()))?;
				return Ok(NavigateResult {
					tab_id: Some(tab_id.to_string()),
				});
			}
			NavigateAction::CloseTab => {
				self.channel
					.send_to_browser("Target.closeTarget", json!({ "targetId": self.tab_id }))
					.await?;
			}
		}
		Ok(NavigateResult::default())
	}

	async fn step_history(&self, offset: i64) -> Result<()> {
		let history = self.send("Page.getNavigationHistory", json!({})).await?;
		let current = history["currentIndex"].as_i64().unwrap_or(0);
		let entries = history["entries"].as_array().map(Vec::as_slice).unwrap_or_default();

		let entry = usize::try_from(current + offset).ok().and_then(|index| entries.get(index));
		let Some(entry_id) = entry.and_then(|e| e["id"].as_i64()) else {
			let direction = if offset < 0 { "back" } else { "forward" };
			return Err(BridgeError::InvalidInput(format!("no history entry to go {direction} to")));
		};

		self.send("Page.navigateToHistoryEntry", json!({ "entryId": entry_id }))
			.await?;
		Ok(())
	}
}
