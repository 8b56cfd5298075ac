//! CDP error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CdpError>;

/// Errors raised by the direct CDP session and the browser launcher.
#[derive(Debug, Error)]
pub enum CdpError {
	/// Failed to open the WebSocket to the browser.
	#[error("connection failed: {0}")]
	ConnectionFailed(String),

	/// Nothing answers on the debugging port.
	#[error("browser not available on port {port}: {reason}")]
	BrowserNotAvailable { port: u16, reason: String },

	/// Browser process could not be started.
	#[error("browser launch failed: {0}")]
	Launch(String),

	#[error("websocket error: {0}")]
	WebSocket(String),

	/// The browser answered the command with an error object.
	#[error("{message} (code: {code})")]
	Protocol { code: i64, message: String },

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("http error: {0}")]
	Http(String),

	#[error("timeout after {timeout_ms}ms waiting for {method}")]
	Timeout { method: String, timeout_ms: u64 },

	/// The socket closed before a reply arrived.
	#[error("CDP session closed")]
	SessionClosed,

	#[error("invalid response: {0}")]
	InvalidResponse(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
	fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
		CdpError::WebSocket(e.to_string())
	}
}

impl From<reqwest::Error> for CdpError {
	fn from(e: reqwest::Error) -> Self {
		CdpError::Http(e.to_string())
	}
}
