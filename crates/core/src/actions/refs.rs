use serde::Deserialize;
use tracing::debug;

use super::TabHandle;
use crate::error::{BridgeError, Result};
use crate::scripts;

#[derive(Debug, Deserialize)]
struct RefPosition {
	x: f64,
	y: f64,
	visible: bool,
}

impl TabHandle<'_> {
	/// Viewport coordinates of the centre of `reference`.
	///
	/// An element that is present but off-screen is scrolled into view and
	/// resolved once more after the settle delay; whatever that second
	/// resolution reports is used. A missing element fails immediately.
	pub async fn locate(&self, reference: &str) -> Result<(f64, f64)> {
		let first = self.position(reference).await?;
		if first.visible {
			return Ok((first.x, first.y));
		}

		debug!(target = "bridge.actions", tab = self.tab_id, reference, "element off-screen, scrolling into view");
		self.evaluate(&scripts::scroll_into_view(reference)).await?;
		tokio::time::sleep(self.timing.settle()).await;

		let second = self.position(reference).await?;
		if !second.visible {
			debug!(target = "bridge.actions", tab = self.tab_id, reference, "element still reported off-screen");
		}
		Ok((second.x, second.y))
	}

	async fn position(&self, reference: &str) -> Result<RefPosition> {
		self.evaluate_as::<Option<RefPosition>>(&scripts::resolve_ref(reference))
			.await?
			.ok_or_else(|| BridgeError::ElementNotFound(reference.to_string()))
	}
}
