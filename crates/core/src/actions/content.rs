use std::path::Path;
use std::time::Duration;

use bridge_protocol::{DialogAction, ElementMatch, FillResult, SnapshotResult};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::debug;

use super::{MAX_FIND_RESULTS, SnapshotOptions, TabHandle};
use crate::error::{BridgeError, Result};
use crate::scripts::{self, ref_selector};

#[derive(Debug, Deserialize)]
struct RawSnapshot {
	title: String,
	url: String,
	snapshot: String,
}

impl TabHandle<'_> {
	pub async fn snapshot(&self, options: &SnapshotOptions) -> Result<SnapshotResult> {
		let script = scripts::snapshot(options.depth, options.filter, options.reference.as_deref());
		let raw = self
			.evaluate_as::<Option<RawSnapshot>>(&script)
			.await?
			.ok_or_else(|| BridgeError::ElementNotFound(options.reference.clone().unwrap_or_default()))?;

		let (snapshot, truncated) = match options.max_chars {
			Some(max) => truncate_chars(raw.snapshot, max),
			None => (raw.snapshot, false),
		};
		Ok(SnapshotResult {
			title: raw.title,
			url: raw.url,
			snapshot,
			truncated,
		})
	}

	/// Ranked matches for a free-text query, best first, at most
	/// [`MAX_FIND_RESULTS`].
	pub async fn find_elements(&self, query: &str) -> Result<Vec<ElementMatch>> {
		if query.trim().is_empty() {
			return Err(BridgeError::InvalidInput("query must not be empty".into()));
		}
		let mut matches: Vec<ElementMatch> = self
			.evaluate_as(&scripts::find_elements(query, MAX_FIND_RESULTS))
			.await?;
		matches.sort_by(|a, b| b.score.total_cmp(&a.score));
		matches.truncate(MAX_FIND_RESULTS);
		Ok(matches)
	}

	pub async fn fill(&self, reference: &str, value: &str) -> Result<FillResult> {
		self.evaluate_as::<Option<FillResult>>(&scripts::set_form_value(reference, value))
			.await?
			.ok_or_else(|| BridgeError::ElementNotFound(reference.to_string()))
	}

	/// Polls the page text until `text` appears or `timeout` elapses.
	///
	/// Evaluation failures while the page is navigating count as "not yet".
	pub async fn wait_for_text(&self, text: &str, timeout: Duration) -> Result<bool> {
		let deadline = Instant::now() + timeout;
		let script = scripts::text_present(text);

		loop {
			match self.evaluate_as::<bool>(&script).await {
				Ok(true) => return Ok(true),
				Ok(false) => {}
				Err(BridgeError::UpstreamProtocol(message)) => {
					debug!(
						target = "bridge.actions",
						tab = self.tab_id,
						error = %message,
						"text probe failed, retrying"
					);
				}
				Err(err) => return Err(err),
			}

			let now = Instant::now();
			if now >= deadline {
				return Ok(false);
			}
			tokio::time::sleep(self.timing.poll_interval().min(deadline - now)).await;
		}
	}

	pub async fn handle_dialog(&self, action: DialogAction, prompt_text: Option<&str>) -> Result<()> {
		let mut params = json!({ "accept": action == DialogAction::Accept });
		if let Some(text) = prompt_text {
			params["promptText"] = json!(text);
		}
		self.send("Page.handleJavaScriptDialog", params).await?;
		Ok(())
	}

	/// Resolves `reference` to a DOM node and sets `file_path` as its files.
	pub async fn upload_file(&self, reference: &str, file_path: &Path) -> Result<()> {
		match tokio::fs::metadata(file_path).await {
			Ok(meta) if meta.is_file() => {}
			Ok(_) => return Err(BridgeError::InvalidInput(format!("not a file: {}", file_path.display()))),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
				return Err(BridgeError::InvalidInput(format!("no such file: {}", file_path.display())));
			}
			Err(err) => return Err(err.into()),
		}

		let document = self.send("DOM.getDocument", json!({ "depth": 0 })).await?;
		let root = document["root"]["nodeId"]
			.as_u64()
			.ok_or_else(|| BridgeError::UpstreamProtocol("DOM.getDocument returned no root node".into()))?;

		let found = self
			.send("DOM.querySelector", json!({ "nodeId": root, "selector": ref_selector(reference) }))
			.await?;
		let node_id = found["nodeId"].as_u64().unwrap_or(0);
		if node_id == 0 {
			return Err(BridgeError::ElementNotFound(reference.to_string()));
		}

		self.send(
			"DOM.setFileInputFiles",
			json!({ "nodeId": node_id, "files": [file_path.display().to_string()] }),
		)
		.await?;
		Ok(())
	}
}

/// Cuts `text` to at most `max` characters without splitting a character.
fn truncate_chars(text: String, max: usize) -> (String, bool) {
	match text.char_indices().nth(max) {
		Some((byte_index, _)) => {
			let mut text = text;
			text.truncate(byte_index);
			(text, true)
		}
		None => (text, false),
	}
}
