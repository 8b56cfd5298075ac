//! Bridge-managed browser reached over its own debugging port.
//!
//! The browser is found or launched lazily on first use. One browser-level
//! [`CdpSession`] carries every command; tabs are addressed through flattened
//! sessions from `Target.attachToTarget`, cached per target until the browser
//! reports the session detached.


use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_protocol::{PageInfo, Tab};
use bridge_runtime::{BrowserProcess, CdpSession, LaunchOptions, launcher};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{BrowserChannel, Channel};
use crate::config::BotConfig;
use crate::error::{BridgeError, Result};

struct Connection {
	session: Arc<CdpSession>,
	detach_watcher: JoinHandle<()>,
}

impl Drop for Connection {
	fn drop(&mut self) {
		self.detach_watcher.abort();
	}
}

pub struct BotBrowser {
	options: LaunchOptions,
	command_timeout: Duration,
	connection: tokio::sync::Mutex<Option<Connection>>,
	/// target id -> flattened session id
	attached: Arc<Mutex<HashMap<String, String>>>,
	/// Held while attaching, so concurrent first commands share one session.
	attaching: tokio::sync::Mutex<()>,
	launched: Mutex<Option<BrowserProcess>>,
}

impl BotBrowser {
	pub fn new(options: LaunchOptions, command_timeout: Duration) -> Self {
		Self {
			options,
			command_timeout,
			connection: tokio::sync::Mutex::new(None),
			attached: Arc::new(Mutex::new(HashMap::new())),
			attaching: tokio::sync::Mutex::new(()),
			launched: Mutex::new(None),
		}
	}

	pub fn from_config(config: &BotConfig) -> Self {
		Self::new(config.launch_options(), config.command_timeout())
	}

	pub fn port(&self) -> u16 {
		self.options.port
	}

	/// Whether a browser answers on the debugging port. Never launches one.
	pub async fn is_running(&self) -> bool {
		launcher::fetch_version(self.options.port).await.is_ok()
	}

	pub fn attached_session(&self, target_id: &str) -> Option<String> {
		self.attached.lock().get(target_id).cloned()
	}

	/// Page targets from `/json/list`. Never launches a browser.
	pub async fn tabs(&self) -> Result<Vec<Tab>> {
		let targets = launcher::list_targets(self.options.port).await?;
		Ok(targets
			.into_iter()
			.filter(PageInfo::is_page)
			.map(|page| Tab {
				session_id: self.attached_session(&page.id),
				id: page.id,
				title: page.title,
				url: page.url,
			})
			.collect())
	}

	/// Starts the bot browser unless one is already running, optionally
	/// opening `url` in a new tab. Returns a human-readable summary.
	pub async fn launch(&self, headless: Option<bool>, url: Option<&str>) -> Result<String> {
		let port = self.options.port;
		let mut message = if self.is_running().await {
			match self.launched.lock().as_ref() {
				Some(process) if process.port == port => {
					format!("Bot browser already running on port {port} (pid {})", process.pid)
				}
				_ => format!("Bot browser already running on port {port}"),
			}
		} else {
			let mut options = self.options.clone();
			if let Some(headless) = headless {
				options.headless = headless;
			}
			let process = launcher::launch_browser(&options).await?;
			let message = format!("Bot browser launched on port {port} (pid {})", process.pid);
			*self.launched.lock() = Some(process);
			message
		};

		if let Some(url) = url {
			let tab_id = self.open_tab(url).await?;
			message.push_str(&format!(", opened {url} in tab {tab_id}"));
		}
		Ok(message)
	}

	pub async fn open_tab(&self, url: &str) -> Result<String> {
		let result = self.send_to_browser("Target.createTarget", json!({ "url": url })).await?;
		result["targetId"]
			.as_str()
			.map(str::to_owned)
			.ok_or_else(|| BridgeError::UpstreamProtocol("Target.createTarget returned no targetId".into()))
	}

	/// Browser-level session, connecting (and launching) on first use or after
	/// the previous socket closed.
	async fn session(&self) -> Result<Arc<CdpSession>> {
		let mut connection = self.connection.lock().await;
		if let Some(conn) = connection.as_ref() {
			if !conn.session.is_closed() {
				return Ok(Arc::clone(&conn.session));
			}
		}

		self.attached.lock().clear();
		let (version, process) = launcher::ensure_browser(&self.options).await?;
		if let Some(process) = process {
			info!(target = "bridge.bot", pid = process.pid, port = process.port, "bot browser launched");
			*self.launched.lock() = Some(process);
		}

		let session =
			Arc::new(CdpSession::connect_with_timeout(&version.web_socket_debugger_url, self.command_timeout).await?);
		let detach_watcher = self.watch_detaches(&session);
		debug!(target = "bridge.bot", url = %version.web_socket_debugger_url, "bot session connected");

		*connection = Some(Connection {
			session: Arc::clone(&session),
			detach_watcher,
		});
		Ok(session)
	}

	fn watch_detaches(&self, session: &CdpSession) -> JoinHandle<()> {
		let mut detached = session.subscribe("Target.detachedFromTarget");
		let attached = Arc::clone(&self.attached);
		tokio::spawn(async move {
			while let Some(event) = detached.recv().await {
				let Some(session_id) = event.params["sessionId"].as_str() else {
					continue;
				};
				attached.lock().retain(|_, sid| sid != session_id);
				debug!(target = "bridge.bot", session_id, "tab session detached");
			}
		})
	}

	/// Flattened session for `target_id`, attaching on first use.
	async fn attach(&self, session: &CdpSession, target_id: &str) -> Result<String> {
		if let Some(session_id) = self.attached_session(target_id) {
			return Ok(session_id);
		}
		let _attaching = self.attaching.lock().await;
		if let Some(session_id) = self.attached_session(target_id) {
			return Ok(session_id);
		}

		let result = session
			.call("Target.attachToTarget", json!({ "targetId": target_id, "flatten": true }), None)
			.await?;
		let session_id = result["sessionId"]
			.as_str()
			.ok_or_else(|| BridgeError::UpstreamProtocol("Target.attachToTarget returned no sessionId".into()))?
			.to_string();
		session.call("Page.enable", json!({}), Some(&session_id)).await?;

		debug!(target = "bridge.bot", target_id, session_id = %session_id, "attached to tab");
		self.attached.lock().insert(target_id.to_string(), session_id.clone());
		Ok(session_id)
	}
}

#[async_trait]
impl BrowserChannel for BotBrowser {
	fn kind(&self) -> Channel {
		Channel::Bot
	}

	async fn list_tabs(&self) -> Result<Vec<Tab>> {
		self.session().await?;
		self.tabs().await
	}

	async fn send_to_tab(&self, tab_id: &str, method: &str, params: Value) -> Result<Value> {
		let session = self.session().await?;
		let session_id = self.attach(&session, tab_id).await?;
		match session.call(method, params, Some(&session_id)).await {
			Ok(value) => Ok(value),
			Err(err) => {
				let err = BridgeError::from(err);
				if matches!(err, BridgeError::TargetNotFound(_)) {
					self.attached.lock().remove(tab_id);
				}
				Err(err)
			}
		}
	}

	async fn send_to_browser(&self, method: &str, params: Value) -> Result<Value> {
		let session = self.session().await?;
		Ok(session.call(method, params, None).await?)
	}
}
