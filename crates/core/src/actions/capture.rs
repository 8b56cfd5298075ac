use bridge_protocol::{Screenshot, ScreenshotFormat};
use serde_json::json;

use super::{DEFAULT_JPEG_QUALITY, ScreenshotOptions, TabHandle};
use crate::error::{BridgeError, Result};

impl TabHandle<'_> {
	/// Captures the viewport, or the whole document when `full_page` is set.
	pub async fn screenshot(&self, options: ScreenshotOptions) -> Result<Screenshot> {
		let mut params = json!({ "format": options.format.as_cdp() });
		if options.format == ScreenshotFormat::Jpeg {
			params["quality"] = json!(options.quality.unwrap_or(DEFAULT_JPEG_QUALITY).min(100));
		}

		if options.full_page {
			let metrics = self.send("Page.getLayoutMetrics", json!({})).await?;
			let content = if metrics["cssContentSize"].is_object() {
				&metrics["cssContentSize"]
			} else {
				&metrics["contentSize"]
			};
			let width = content["width"].as_f64().unwrap_or_default().ceil();
			let height = content["height"].as_f64().unwrap_or_default().ceil();
			params["clip"] = json!({ "x": 0, "y": 0, "width": width, "height": height, "scale": 1 });
			params["captureBeyondViewport"] = json!(true);
		}

		let result = self.send("Page.captureScreenshot", params).await?;
		let data = result["data"]
			.as_str()
			.ok_or_else(|| BridgeError::UpstreamProtocol("Page.captureScreenshot returned no data".into()))?;
		Ok(Screenshot {
			data: data.to_string(),
			mime_type: options.format.mime_type().to_string(),
		})
	}
}
