//! Bridge configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is a
//! valid configuration. The CLI layers flags and `BRIDGE_*` variables on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bridge_runtime::LaunchOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("cannot read config {}: {source}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid config {}: {source}", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
	pub relay: RelayConfig,
	pub bot: BotConfig,
	pub timing: ActionTiming,
}

impl BridgeConfig {
	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})
	}
}

/// User-channel relay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelayConfig {
	/// How long a forwarded command waits for the extension's reply.
	pub command_timeout_ms: u64,
	/// Interval between `ping` frames sent to the extension.
	pub heartbeat_interval_ms: u64,
}

impl Default for RelayConfig {
	fn default() -> Self {
		Self {
			command_timeout_ms: 30_000,
			heartbeat_interval_ms: 5_000,
		}
	}
}

impl RelayConfig {
	pub fn command_timeout(&self) -> Duration {
		Duration::from_millis(self.command_timeout_ms)
	}

	pub fn heartbeat_interval(&self) -> Duration {
		Duration::from_millis(self.heartbeat_interval_ms.max(1))
	}
}

/// Bot-channel browser settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BotConfig {
	pub port: u16,
	pub headless: bool,
	pub executable: Option<PathBuf>,
	pub user_data_dir: Option<PathBuf>,
	pub launch_timeout_ms: u64,
	pub command_timeout_ms: u64,
}

impl Default for BotConfig {
	fn default() -> Self {
		Self {
			port: bridge_runtime::launcher::DEFAULT_DEBUG_PORT,
			headless: false,
			executable: None,
			user_data_dir: None,
			launch_timeout_ms: 5_000,
			command_timeout_ms: 30_000,
		}
	}
}

impl BotConfig {
	pub fn launch_options(&self) -> LaunchOptions {
		LaunchOptions {
			port: self.port,
			headless: self.headless,
			executable: self.executable.clone(),
			user_data_dir: self.user_data_dir.clone(),
			startup_timeout: Duration::from_millis(self.launch_timeout_ms),
		}
	}

	pub fn command_timeout(&self) -> Duration {
		Duration::from_millis(self.command_timeout_ms)
	}
}

/// Delays used by multi-step actions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionTiming {
	/// Pause after scrolling an element into view before re-resolving it.
	pub settle_ms: u64,
	/// Interval between page polls in `wait_for_text`.
	pub poll_interval_ms: u64,
}

impl Default for ActionTiming {
	fn default() -> Self {
		Self {
			settle_ms: 300,
			poll_interval_ms: 500,
		}
	}
}

impl ActionTiming {
	pub fn settle(&self) -> Duration {
		Duration::from_millis(self.settle_ms)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms.max(1))
	}
}
