//! JSON endpoints: one handler per bridge action.

use std::path::PathBuf;

use axum::extract::{Path, Query, State};
use bridge::{ClickOptions, ClickTarget, ScreenshotOptions, SnapshotOptions};
use bridge_protocol::{
	ChannelHint, DialogAction, MouseButton, NavigateAction, ScreenshotFormat, ScrollDirection, SnapshotFilter,
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppState;
use super::response::{ApiJson, ApiResult, ok};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ChannelQuery {
	pub channel: Option<String>,
}

fn parse_channel(raw: Option<&str>) -> Result<Option<ChannelHint>, ApiError> {
	raw.filter(|c| !c.is_empty())
		.map(str::parse::<ChannelHint>)
		.transpose()
		.map_err(ApiError::BadRequest)
}

pub async fn status(State(state): State<AppState>) -> ApiResult {
	ok(state.bridge.get_status().await)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LaunchRequest {
	headless: Option<bool>,
	url: Option<String>,
}

pub async fn launch_bot(State(state): State<AppState>, ApiJson(req): ApiJson<LaunchRequest>) -> ApiResult {
	let message = state.bridge.launch_bot_browser(req.headless, req.url.as_deref()).await?;
	ok(json!({ "message": message }))
}

pub async fn list_tabs(State(state): State<AppState>, Query(query): Query<ChannelQuery>) -> ApiResult {
	let hint = parse_channel(query.channel.as_deref())?;
	ok(json!({ "tabs": state.bridge.list_tabs(hint).await? }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapshotRequest {
	channel: Option<ChannelHint>,
	depth: Option<u32>,
	filter: SnapshotFilter,
	#[serde(alias = "ref")]
	ref_id: Option<String>,
	max_chars: Option<usize>,
}

pub async fn snapshot(
	State(state): State<AppState>,
	Path(tab_id): Path<String>,
	ApiJson(req): ApiJson<SnapshotRequest>,
) -> ApiResult {
	let options = SnapshotOptions {
		depth: req.depth,
		filter: req.filter,
		reference: req.ref_id,
		max_chars: req.max_chars,
	};
	ok(state.bridge.snapshot(req.channel, &tab_id, &options).await?)
}

#[derive(Debug, Deserialize)]
pub struct FindRequest {
	#[serde(default)]
	channel: Option<ChannelHint>,
	query: String,
}

pub async fn find(
	State(state): State<AppState>,
	Path(tab_id): Path<String>,
	ApiJson(req): ApiJson<FindRequest>,
) -> ApiResult {
	let matches = state.bridge.find_elements(req.channel, &tab_id, &req.query).await?;
	ok(json!({ "matches": matches }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScreenshotRequest {
	channel: Option<ChannelHint>,
	full_page: bool,
	format: ScreenshotFormat,
	quality: Option<u8>,
}

pub async fn screenshot(
	State(state): State<AppState>,
	Path(tab_id): Path<String>,
	ApiJson(req): ApiJson<ScreenshotRequest>,
) -> ApiResult {
	let options = ScreenshotOptions {
		format: req.format,
		quality: req.quality,
		full_page: req.full_page,
	};
	ok(state.bridge.screenshot(req.channel, &tab_id, options).await?)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NavigateRequest {
	channel: Option<ChannelHint>,
	url: Option<String>,
	action: NavigateAction,
}

pub async fn navigate(
	State(state): State<AppState>,
	Path(tab_id): Path<String>,
	ApiJson(req): ApiJson<NavigateRequest>,
) -> ApiResult {
	ok(state
		.bridge
		.navigate(req.channel, &tab_id, req.action, req.url.as_deref())
		.await?)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClickRequest {
	channel: Option<ChannelHint>,
	#[serde(rename = "ref")]
	reference: Option<String>,
	x: Option<f64>,
	y: Option<f64>,
	button: MouseButton,
	click_count: Option<u32>,
}

impl ClickRequest {
	fn target(&self) -> Result<ClickTarget, ApiError> {
		match (&self.reference, self.x, self.y) {
			(Some(reference), _, _) => Ok(ClickTarget::Ref(reference.clone())),
			(None, Some(x), Some(y)) => Ok(ClickTarget::Point { x, y }),
			_ => Err(ApiError::BadRequest("either ref or both x and y are required".into())),
		}
	}
}

pub async fn click(
	State(state): State<AppState>,
	Path(tab_id): Path<String>,
	ApiJson(req): ApiJson<ClickRequest>,
) -> ApiResult {
	let target = req.target()?;
	let options = ClickOptions {
		button: req.button,
		click_count: req.click_count.unwrap_or(1),
	};
	state.bridge.click_element(req.channel, &tab_id, &target, options).await?;
	ok(())
}

#[derive(Debug, Deserialize)]
pub struct FillRequest {
	#[serde(default)]
	channel: Option<ChannelHint>,
	#[serde(rename = "ref")]
	reference: String,
	value: String,
}

pub async fn fill(
	State(state): State<AppState>,
	Path(tab_id): Path<String>,
	ApiJson(req): ApiJson<FillRequest>,
) -> ApiResult {
	ok(state
		.bridge
		.fill_form(req.channel, &tab_id, &req.reference, &req.value)
		.await?)
}

#[derive(Debug, Deserialize)]
pub struct PressRequest {
	#[serde(default)]
	channel: Option<ChannelHint>,
	key: String,
}

pub async fn press(
	State(state): State<AppState>,
	Path(tab_id): Path<String>,
	ApiJson(req): ApiJson<PressRequest>,
) -> ApiResult {
	state.bridge.press_key(req.channel, &tab_id, &req.key).await?;
	ok(())
}

#[derive(Debug, Deserialize)]
pub struct ScrollRequest {
	#[serde(default)]
	channel: Option<ChannelHint>,
	direction: ScrollDirection,
	#[serde(default)]
	amount: Option<f64>,
	#[serde(default, rename = "ref")]
	reference: Option<String>,
}

pub async fn scroll(
	State(state): State<AppState>,
	Path(tab_id): Path<String>,
	ApiJson(req): ApiJson<ScrollRequest>,
) -> ApiResult {
	state
		.bridge
		.scroll(req.channel, &tab_id, req.direction, req.amount, req.reference.as_deref())
		.await?;
	ok(())
}

#[derive(Debug, Deserialize)]
pub struct WaitRequest {
	#[serde(default)]
	channel: Option<ChannelHint>,
	text: String,
	/// Milliseconds.
	#[serde(default)]
	timeout: Option<u64>,
}

pub async fn wait(
	State(state): State<AppState>,
	Path(tab_id): Path<String>,
	ApiJson(req): ApiJson<WaitRequest>,
) -> ApiResult {
	let found = state
		.bridge
		.wait_for_text(req.channel, &tab_id, &req.text, req.timeout)
		.await?;
	ok(json!({ "found": found }))
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
	#[serde(default)]
	channel: Option<ChannelHint>,
	expression: String,
}

pub async fn evaluate(
	State(state): State<AppState>,
	Path(tab_id): Path<String>,
	ApiJson(req): ApiJson<EvaluateRequest>,
) -> ApiResult {
	let result = state.bridge.evaluate(req.channel, &tab_id, &req.expression).await?;
	ok(json!({ "result": result }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
	#[serde(default)]
	channel: Option<ChannelHint>,
	#[serde(rename = "ref")]
	reference: String,
	file_path: PathBuf,
}

pub async fn upload(
	State(state): State<AppState>,
	Path(tab_id): Path<String>,
	ApiJson(req): ApiJson<UploadRequest>,
) -> ApiResult {
	state
		.bridge
		.upload_file(req.channel, &tab_id, &req.reference, &req.file_path)
		.await?;
	ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogRequest {
	#[serde(default)]
	channel: Option<ChannelHint>,
	action: DialogAction,
	#[serde(default)]
	prompt_text: Option<String>,
}

pub async fn dialog(
	State(state): State<AppState>,
	Path(tab_id): Path<String>,
	ApiJson(req): ApiJson<DialogRequest>,
) -> ApiResult {
	state
		.bridge
		.handle_dialog(req.channel, &tab_id, req.action, req.prompt_text.as_deref())
		.await?;
	ok(())
}

#[derive(Debug, Deserialize)]
pub struct ToolRequest {
	name: String,
	#[serde(default)]
	args: Value,
}

pub async fn tool(
	State(state): State<AppState>,
	Path(tab_id): Path<String>,
	ApiJson(req): ApiJson<ToolRequest>,
) -> ApiResult {
	let args = if req.args.is_null() { json!({}) } else { req.args };
	let result = state.bridge.call_extension_tool(&req.name, args, Some(&tab_id)).await?;
	ok(json!({ "result": result }))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn channel_query_accepts_known_names() {
		assert_eq!(parse_channel(None).unwrap(), None);
		assert_eq!(parse_channel(Some("")).unwrap(), None);
		assert_eq!(parse_channel(Some("bot")).unwrap(), Some(ChannelHint::Bot));
		assert_eq!(parse_channel(Some("User")).unwrap(), Some(ChannelHint::User));
		assert!(matches!(parse_channel(Some("tor")), Err(ApiError::BadRequest(_))));
	}

	#[test]
	fn click_needs_ref_or_point() {
		let by_ref: ClickRequest = serde_json::from_value(json!({ "ref": "e4", "clickCount": 2 })).unwrap();
		assert_eq!(by_ref.target().unwrap(), ClickTarget::Ref("e4".into()));
		assert_eq!(by_ref.click_count, Some(2));

		let by_point: ClickRequest = serde_json::from_value(json!({ "x": 3.0, "y": 4.0, "button": "right" })).unwrap();
		assert_eq!(by_point.target().unwrap(), ClickTarget::Point { x: 3.0, y: 4.0 });
		assert_eq!(by_point.button, MouseButton::Right);

		let neither: ClickRequest = serde_json::from_value(json!({ "x": 3.0 })).unwrap();
		assert!(neither.target().is_err());
	}

	#[test]
	fn snapshot_accepts_ref_alias() {
		let req: SnapshotRequest =
			serde_json::from_value(json!({ "ref": "e2", "filter": "interactive", "maxChars": 500 })).unwrap();
		assert_eq!(req.ref_id.as_deref(), Some("e2"));
		assert_eq!(req.filter, SnapshotFilter::Interactive);
		assert_eq!(req.max_chars, Some(500));
	}

	#[test]
	fn navigate_defaults_to_goto() {
		let req: NavigateRequest = serde_json::from_value(json!({ "url": "https://a.test/" })).unwrap();
		assert_eq!(req.action, NavigateAction::Goto);
		let req: NavigateRequest = serde_json::from_value(json!({ "action": "new_tab" })).unwrap();
		assert_eq!(req.action, NavigateAction::NewTab);
	}
}
