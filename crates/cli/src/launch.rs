use std::time::Duration;

use anyhow::{Context, Result};
use bridge::BotBrowser;
use bridge_runtime::launcher;
use serde_json::json;
use tracing::info;

use crate::cli::LaunchArgs;

const OPEN_TAB_TIMEOUT: Duration = Duration::from_secs(30);

/// `bridge launch`: reuse or start a debuggable browser, optionally open a
/// tab, and print the endpoint as JSON on stdout.
pub async fn run(args: &LaunchArgs) -> Result<()> {
	let options = args.launch_options();
	let (version, process) = launcher::ensure_browser(&options)
		.await
		.with_context(|| format!("Starting browser on port {}", options.port))?;
	if let Some(process) = &process {
		info!(target = "bridge.launch", pid = process.pid, executable = %process.executable, "browser launched");
	}

	let tab_id = match &args.url {
		Some(url) => {
			let bot = BotBrowser::new(options.clone(), OPEN_TAB_TIMEOUT);
			Some(bot.open_tab(url).await.with_context(|| format!("Opening {url}"))?)
		}
		None => None,
	};

	let summary = json!({
		"port": options.port,
		"launched": process.is_some(),
		"pid": process.as_ref().map(|p| p.pid),
		"browser": version.browser,
		"webSocketDebuggerUrl": version.web_socket_debugger_url,
		"tabId": tab_id,
	});
	println!("{}", serde_json::to_string_pretty(&summary)?);
	Ok(())
}
