use bridge_runtime::CdpError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Every failure a bridge action can report.
#[derive(Debug, Error)]
pub enum BridgeError {
	/// Forced user channel without an extension, or a bot browser that is
	/// neither reachable nor launchable.
	#[error("channel unavailable: {0}")]
	ChannelUnavailable(String),

	/// Unknown tab, target or session id.
	#[error("target not found: {0}")]
	TargetNotFound(String),

	/// Ref resolution failed, including after scroll-and-retry.
	#[error("element not found: {0}")]
	ElementNotFound(String),

	#[error("timeout after {timeout_ms}ms waiting for {method}")]
	CommandTimeout { method: String, timeout_ms: u64 },

	/// Pending request rejected because the extension socket closed, or a
	/// command issued while no extension is attached.
	#[error("extension disconnected")]
	ExtensionDisconnected,

	/// The browser reported a script exception or navigation failure; the
	/// message is the browser's own text.
	#[error("{0}")]
	UpstreamProtocol(String),

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl BridgeError {
	/// Stable machine-readable code for API envelopes.
	pub fn code(&self) -> &'static str {
		match self {
			BridgeError::ChannelUnavailable(_) => "CHANNEL_UNAVAILABLE",
			BridgeError::TargetNotFound(_) => "TARGET_NOT_FOUND",
			BridgeError::ElementNotFound(_) => "ELEMENT_NOT_FOUND",
			BridgeError::CommandTimeout { .. } => "COMMAND_TIMEOUT",
			BridgeError::ExtensionDisconnected => "EXTENSION_DISCONNECTED",
			BridgeError::UpstreamProtocol(_) => "UPSTREAM_PROTOCOL_ERROR",
			BridgeError::InvalidInput(_) => "INVALID_INPUT",
			BridgeError::Json(_) => "INTERNAL_ERROR",
			BridgeError::Io(_) => "IO_ERROR",
		}
	}

	/// Classifies an error message reported by the browser, whichever channel
	/// carried it.
	pub fn upstream(message: String) -> Self {
		if is_missing_target(&message) {
			BridgeError::TargetNotFound(message)
		} else {
			BridgeError::UpstreamProtocol(message)
		}
	}
}

/// Chrome's wording when a target or flattened session has gone away.
fn is_missing_target(message: &str) -> bool {
	message.contains("No target with given id")
		|| message.contains("No session with given id")
		|| message.contains("Session with given id not found")
}

impl From<CdpError> for BridgeError {
	fn from(err: CdpError) -> Self {
		match err {
			CdpError::Protocol { message, .. } => BridgeError::upstream(message),
			CdpError::Timeout { method, timeout_ms } => BridgeError::CommandTimeout { method, timeout_ms },
			CdpError::Serialization(e) => BridgeError::Json(e),
			CdpError::InvalidResponse(msg) => BridgeError::UpstreamProtocol(msg),
			other @ (CdpError::ConnectionFailed(_)
			| CdpError::BrowserNotAvailable { .. }
			| CdpError::Launch(_)
			| CdpError::WebSocket(_)
			| CdpError::Http(_)
			| CdpError::SessionClosed) => BridgeError::ChannelUnavailable(other.to_string()),
		}
	}
}
