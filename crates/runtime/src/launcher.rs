//! Discovery and launch of a browser with remote debugging enabled.
//!
//! The bot channel needs a debuggable Chromium on a known port. [`ensure_browser`]
//! probes `/json/version` first and only launches a process when nothing answers.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use bridge_protocol::{BrowserVersion, PageInfo};
use tracing::{debug, info};

use crate::error::{CdpError, Result};

pub const DEFAULT_DEBUG_PORT: u16 = 9222;

const PROBE_TIMEOUT: Duration = Duration::from_millis(400);
const STARTUP_POLL: Duration = Duration::from_millis(200);

/// Options for starting a debuggable browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
	pub port: u16,
	pub headless: bool,
	/// Explicit browser binary; searched on the system when absent.
	pub executable: Option<PathBuf>,
	/// Profile directory; defaults to a per-port directory under the temp dir.
	pub user_data_dir: Option<PathBuf>,
	/// How long to wait for the debugging endpoint after spawning.
	pub startup_timeout: Duration,
}

impl Default for LaunchOptions {
	fn default() -> Self {
		Self {
			port: DEFAULT_DEBUG_PORT,
			headless: false,
			executable: None,
			user_data_dir: None,
			startup_timeout: Duration::from_secs(5),
		}
	}
}

impl LaunchOptions {
	pub fn resolved_user_data_dir(&self) -> PathBuf {
		self.user_data_dir
			.clone()
			.unwrap_or_else(|| std::env::temp_dir().join(format!("browser-bridge-profile-{}", self.port)))
	}

	/// Command-line arguments passed to the browser binary.
	pub fn args(&self) -> Vec<String> {
		let mut args = vec![
			format!("--remote-debugging-port={}", self.port),
			format!("--user-data-dir={}", self.resolved_user_data_dir().display()),
			"--no-first-run".to_string(),
			"--no-default-browser-check".to_string(),
		];
		if self.headless {
			args.push("--headless=new".to_string());
		}
		args
	}
}

/// A browser process started by the bridge.
#[derive(Debug, Clone)]
pub struct BrowserProcess {
	pub pid: u32,
	pub port: u16,
	pub executable: String,
	pub version: BrowserVersion,
}

/// Find a Chrome/Chromium executable on the system.
pub fn find_chrome_executable() -> Option<String> {
	let candidates = if cfg!(target_os = "macos") {
		vec![
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
		]
	} else if cfg!(target_os = "windows") {
		vec![
			r"C:\Program Files\Google\Chrome\Application\chrome.exe",
			r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
			r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
			r"C:\Program Files\Chromium\Application\chrome.exe",
		]
	} else {
		vec![
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"brave-browser",
			"microsoft-edge",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/google-chrome",
			"/usr/bin/chromium-browser",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
		]
	};

	candidates.into_iter().find_map(|candidate| {
		if candidate.starts_with('/') || candidate.contains('\\') {
			Path::new(candidate).exists().then(|| candidate.to_string())
		} else {
			which::which(candidate).ok().map(|_| candidate.to_string())
		}
	})
}

fn probe_client() -> Result<reqwest::Client> {
	reqwest::Client::builder()
		.timeout(PROBE_TIMEOUT)
		.build()
		.map_err(|e| CdpError::Http(format!("failed to create HTTP client: {e}")))
}

/// Fetch `/json/version` from a local debugging port.
pub async fn fetch_version(port: u16) -> Result<BrowserVersion> {
	let client = probe_client()?;
	let mut last_error = "no response".to_string();

	// Loopback binding differs between IPv4 and IPv6 setups.
	for url in [
		format!("http://127.0.0.1:{port}/json/version"),
		format!("http://localhost:{port}/json/version"),
		format!("http://[::1]:{port}/json/version"),
	] {
		let response = match client.get(&url).send().await {
			Ok(r) => r,
			Err(e) => {
				last_error = e.to_string();
				continue;
			}
		};

		if !response.status().is_success() {
			last_error = format!("unexpected status {}", response.status());
			continue;
		}

		return response
			.json::<BrowserVersion>()
			.await
			.map_err(|e| CdpError::InvalidResponse(format!("/json/version: {e}")));
	}

	Err(CdpError::BrowserNotAvailable {
		port,
		reason: last_error,
	})
}

/// Fetch `/json/list` from a local debugging port.
pub async fn list_targets(port: u16) -> Result<Vec<PageInfo>> {
	let client = probe_client()?;
	let response = client
		.get(format!("http://127.0.0.1:{port}/json/list"))
		.send()
		.await
		.map_err(|e| CdpError::BrowserNotAvailable {
			port,
			reason: e.to_string(),
		})?;
	let targets = response.json::<Vec<PageInfo>>().await?;
	Ok(targets)
}

/// Spawn a browser with remote debugging and wait for its endpoint.
pub async fn launch_browser(opts: &LaunchOptions) -> Result<BrowserProcess> {
	let executable = match &opts.executable {
		Some(path) => path.display().to_string(),
		None => find_chrome_executable().ok_or_else(|| {
			CdpError::Launch("could not find a Chrome/Chromium executable; pass one explicitly".into())
		})?,
	};

	let profile = opts.resolved_user_data_dir();
	std::fs::create_dir_all(&profile)
		.map_err(|e| CdpError::Launch(format!("cannot create profile dir {}: {e}", profile.display())))?;

	let mut cmd = Command::new(&executable);
	cmd.args(opts.args())
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null());

	// New process group so the browser outlives the bridge.
	#[cfg(unix)]
	std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

	let mut child = cmd
		.spawn()
		.map_err(|e| CdpError::Launch(format!("failed to start {executable}: {e}")))?;
	let pid = child.id();
	debug!(target = "bridge.launcher", pid, executable = %executable, port = opts.port, "browser spawned");

	let attempts = (opts.startup_timeout.as_millis() / STARTUP_POLL.as_millis()).max(1);
	let mut last_error = "endpoint not reachable".to_string();
	for _ in 0..attempts {
		tokio::time::sleep(STARTUP_POLL).await;

		if let Ok(Some(status)) = child.try_wait() {
			return Err(CdpError::Launch(format!(
				"browser exited before the debugging endpoint came up (status: {status})"
			)));
		}

		match fetch_version(opts.port).await {
			Ok(version) => {
				info!(target = "bridge.launcher", pid, port = opts.port, browser = %version.browser, "browser ready");
				return Ok(BrowserProcess {
					pid,
					port: opts.port,
					executable,
					version,
				});
			}
			Err(e) => last_error = e.to_string(),
		}
	}

	// Reap the half-started browser rather than leaving it holding the profile.
	if let Err(e) = child.kill() {
		debug!(target = "bridge.launcher", pid, error = %e, "kill after startup timeout failed");
	}
	let _ = child.wait();
	Err(CdpError::Launch(format!(
		"browser started but port {} never answered: {last_error}",
		opts.port
	)))
}

/// Reuse a browser already listening on the port, or launch one.
///
/// Returns the process handle only when this call started the browser.
pub async fn ensure_browser(opts: &LaunchOptions) -> Result<(BrowserVersion, Option<BrowserProcess>)> {
	if let Ok(version) = fetch_version(opts.port).await {
		debug!(target = "bridge.launcher", port = opts.port, "reusing running browser");
		return Ok((version, None));
	}
	let process = launch_browser(opts).await?;
	Ok((process.version.clone(), Some(process)))
}

#[cfg(test)]
mod tests {
	use tokio::net::TcpListener;

	use super::*;

	#[test]
	fn args_include_port_and_profile() {
		let opts = LaunchOptions {
			port: 9333,
			user_data_dir: Some(PathBuf::from("/tmp/profile-a")),
			..Default::default()
		};
		let args = opts.args();
		assert!(args.contains(&"--remote-debugging-port=9333".to_string()));
		assert!(args.contains(&"--user-data-dir=/tmp/profile-a".to_string()));
		assert!(!args.iter().any(|a| a.starts_with("--headless")));
	}

	#[test]
	fn headless_adds_flag() {
		let opts = LaunchOptions {
			headless: true,
			..Default::default()
		};
		assert!(opts.args().contains(&"--headless=new".to_string()));
	}

	#[test]
	fn default_profile_is_port_scoped() {
		let opts = LaunchOptions {
			port: 9444,
			..Default::default()
		};
		assert!(opts.resolved_user_data_dir().ends_with("browser-bridge-profile-9444"));
	}

	#[tokio::test]
	async fn fetch_version_reports_unreachable_port() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();
		drop(listener);

		let err = fetch_version(port).await.unwrap_err();
		assert!(matches!(err, CdpError::BrowserNotAvailable { port: p, .. } if p == port));
	}

	#[tokio::test]
	async fn launch_with_missing_executable_fails() {
		let dir = tempfile::tempdir().unwrap();
		let opts = LaunchOptions {
			port: 1,
			executable: Some(dir.path().join("no-such-browser")),
			user_data_dir: Some(dir.path().join("profile")),
			startup_timeout: Duration::from_millis(200),
			..Default::default()
		};
		let err = launch_browser(&opts).await.unwrap_err();
		assert!(matches!(err, CdpError::Launch(_)));
	}

	#[cfg(target_os = "linux")]
	#[tokio::test]
	async fn browser_that_never_listens_is_killed() {
		use std::os::unix::fs::PermissionsExt;

		let dir = tempfile::tempdir().unwrap();
		let pid_file = dir.path().join("pid");
		let script = dir.path().join("silent-browser");
		std::fs::write(&script, format!("#!/bin/sh\necho $$ > {}\nexec sleep 30\n", pid_file.display())).unwrap();
		std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();
		drop(listener);

		let opts = LaunchOptions {
			port,
			executable: Some(script),
			user_data_dir: Some(dir.path().join("profile")),
			startup_timeout: Duration::from_millis(600),
			..Default::default()
		};
		let err = launch_browser(&opts).await.unwrap_err();
		assert!(err.to_string().contains("never answered"), "{err}");

		let pid = std::fs::read_to_string(&pid_file).unwrap();
		assert!(!Path::new(&format!("/proc/{}", pid.trim())).exists());
	}
}
