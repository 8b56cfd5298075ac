use axum::Json;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ApiError;

pub type ApiResult = Result<Json<Value>, ApiError>;

/// JSON body extractor whose rejections use the API error envelope.
///
/// An empty body reads as `{}` so endpoints whose fields are all optional
/// accept bare POSTs.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
	T: DeserializeOwned,
	S: Send + Sync,
{
	type Rejection = ApiError;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		let raw = Bytes::from_request(req, state)
			.await
			.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
		let body = if raw.iter().all(u8::is_ascii_whitespace) {
			&b"{}"[..]
		} else {
			&raw[..]
		};
		serde_json::from_slice(body)
			.map(ApiJson)
			.map_err(|err| ApiError::BadRequest(format!("invalid request body: {err}")))
	}
}

/// `{ok: true, ...fields}` for object results, `{ok: true, result}` for
/// anything else, bare `{ok: true}` for unit.
pub fn ok<T: Serialize>(result: T) -> ApiResult {
	let mut body = match serde_json::to_value(result)? {
		Value::Object(fields) => fields,
		Value::Null => Map::new(),
		other => Map::from_iter([("result".to_string(), other)]),
	};
	body.insert("ok".to_string(), Value::Bool(true));
	Ok(Json(Value::Object(body)))
}
