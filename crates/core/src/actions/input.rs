use bridge_protocol::ScrollDirection;
use serde_json::json;

use super::keys::{KeyCombo, KeyDefinition, MODIFIER_ALT, MODIFIER_CONTROL, MODIFIER_META};
use super::{ClickOptions, ClickTarget, TabHandle};
use crate::error::Result;

impl TabHandle<'_> {
	/// Moves the pointer to the target, then dispatches one press/release pair
	/// per click with an increasing `clickCount`.
	pub async fn click(&self, target: &ClickTarget, options: ClickOptions) -> Result<()> {
		let (x, y) = match target {
			ClickTarget::Point { x, y } => (*x, *y),
			ClickTarget::Ref(reference) => self.locate(reference).await?,
		};
		let button = options.button.as_cdp();

		self.send("Input.dispatchMouseEvent", json!({ "type": "mouseMoved", "x": x, "y": y }))
			.await?;
		for click_count in 1..=options.click_count.max(1) {
			for kind in ["mousePressed", "mouseReleased"] {
				self.send(
					"Input.dispatchMouseEvent",
					json!({ "type": kind, "x": x, "y": y, "button": button, "clickCount": click_count }),
				)
				.await?;
			}
		}
		Ok(())
	}

	/// Modifier downs in written order, main key down and up, modifier ups in
	/// reverse. Every event carries the full modifier mask.
	pub async fn press_key(&self, combo: &str) -> Result<()> {
		let combo = KeyCombo::parse(combo)?;
		let mask = combo.modifier_mask();

		for modifier in &combo.modifiers {
			self.dispatch_key("keyDown", modifier, mask).await?;
		}
		self.dispatch_key("keyDown", &combo.key, mask).await?;
		self.dispatch_key("keyUp", &combo.key, mask).await?;
		for modifier in combo.modifiers.iter().rev() {
			self.dispatch_key("keyUp", modifier, mask).await?;
		}
		Ok(())
	}

	async fn dispatch_key(&self, kind: &str, key: &KeyDefinition, modifiers: u32) -> Result<()> {
		let mut params = json!({
			"type": kind,
			"key": key.key,
			"code": key.code,
			"windowsVirtualKeyCode": key.key_code,
			"nativeVirtualKeyCode": key.key_code,
			"modifiers": modifiers,
		});
		// Shortcuts must not insert their character.
		let shortcut = modifiers & (MODIFIER_ALT | MODIFIER_CONTROL | MODIFIER_META) != 0;
		if let (Some(text), "keyDown", false) = (&key.text, kind, shortcut) {
			params["text"] = json!(text);
			params["unmodifiedText"] = json!(text);
		}
		self.send("Input.dispatchKeyEvent", params).await?;
		Ok(())
	}

	/// Mouse-wheel scroll from the element's centre, or from the viewport
	/// centre when no ref is given.
	pub async fn scroll(&self, direction: ScrollDirection, amount: f64, reference: Option<&str>) -> Result<()> {
		let (x, y) = match reference {
			Some(reference) => self.locate(reference).await?,
			None => self.viewport_center().await?,
		};
		let (delta_x, delta_y) = direction.deltas(amount);
		self.send(
			"Input.dispatchMouseEvent",
			json!({ "type": "mouseWheel", "x": x, "y": y, "deltaX": delta_x, "deltaY": delta_y }),
		)
		.await?;
		Ok(())
	}

	async fn viewport_center(&self) -> Result<(f64, f64)> {
		let metrics = self.send("Page.getLayoutMetrics", json!({})).await?;
		let viewport = if metrics["cssLayoutViewport"].is_object() {
			&metrics["cssLayoutViewport"]
		} else {
			&metrics["layoutViewport"]
		};
		let width = viewport["clientWidth"].as_f64().unwrap_or_default();
		let height = viewport["clientHeight"].as_f64().unwrap_or_default();
		Ok((width / 2.0, height / 2.0))
	}
}
