use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bridge::BridgeError;
use serde_json::json;
use thiserror::Error;

/// Failure of one HTTP request, rendered as `{ok: false, error, code}`.
#[derive(Debug, Error)]
pub enum ApiError {
	#[error(transparent)]
	Bridge(#[from] BridgeError),

	#[error("{0}")]
	BadRequest(String),

	#[error("an extension is already connected")]
	ExtensionAlreadyConnected,
}

impl ApiError {
	pub fn status(&self) -> StatusCode {
		match self {
			ApiError::Bridge(err) => match err {
				BridgeError::ChannelUnavailable(_) | BridgeError::ExtensionDisconnected => {
					StatusCode::SERVICE_UNAVAILABLE
				}
				BridgeError::TargetNotFound(_) | BridgeError::ElementNotFound(_) => StatusCode::NOT_FOUND,
				BridgeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
				_ => StatusCode::INTERNAL_SERVER_ERROR,
			},
			ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
			ApiError::ExtensionAlreadyConnected => StatusCode::CONFLICT,
		}
	}

	pub fn code(&self) -> &'static str {
		match self {
			ApiError::Bridge(err) => err.code(),
			ApiError::BadRequest(_) => "INVALID_INPUT",
			ApiError::ExtensionAlreadyConnected => "EXTENSION_ALREADY_CONNECTED",
		}
	}
}

impl From<serde_json::Error> for ApiError {
	fn from(err: serde_json::Error) -> Self {
		ApiError::Bridge(err.into())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status.is_server_error() {
			tracing::warn!(target = "bridge.http", code = self.code(), error = %self, "request failed");
		}
		let body = json!({ "ok": false, "error": self.to_string(), "code": self.code() });
		(status, Json(body)).into_response()
	}
}
