use std::path::PathBuf;

use bridge::config::{BridgeConfig, ConfigError};
use bridge_runtime::LaunchOptions;
use bridge_runtime::launcher::DEFAULT_DEBUG_PORT;
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand};

pub const DEFAULT_SERVER_PORT: u16 = 18792;

/// Green headers, cyan literals; the same palette cargo uses.
fn help_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
		.valid(AnsiColor::Cyan.on_default())
}

#[derive(Parser, Debug)]
#[command(name = "bridge")]
#[command(about = "Drive your own browser or a bot browser over HTTP")]
#[command(version)]
#[command(styles = help_styles())]
pub struct Cli {
	/// Increase verbosity (-v debug, -vv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run the HTTP API, the extension relay and the CDP client endpoint
	Serve(ServeArgs),

	/// Make sure a debuggable browser is listening and print its endpoint
	Launch(LaunchArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
	/// Address to bind
	#[arg(long, env = "BRIDGE_HOST", default_value = "127.0.0.1")]
	pub host: String,

	/// Port for HTTP and WebSocket endpoints
	#[arg(short, long, env = "BRIDGE_PORT", default_value_t = DEFAULT_SERVER_PORT)]
	pub port: u16,

	/// JSON config file; flags override its values
	#[arg(short, long, env = "BRIDGE_CONFIG", value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Remote debugging port of the bot browser
	#[arg(long, env = "BRIDGE_BOT_PORT", value_name = "PORT")]
	pub bot_port: Option<u16>,

	/// Launch the bot browser without a window
	#[arg(long, env = "BRIDGE_HEADLESS")]
	pub headless: bool,

	/// Browser executable for the bot channel
	#[arg(long, env = "BRIDGE_CHROME", value_name = "PATH")]
	pub chrome: Option<PathBuf>,

	/// Profile directory for the bot browser
	#[arg(long, env = "BRIDGE_USER_DATA_DIR", value_name = "DIR")]
	pub user_data_dir: Option<PathBuf>,

	/// How long a command forwarded to the extension may take
	#[arg(long, env = "BRIDGE_COMMAND_TIMEOUT_MS", value_name = "MS")]
	pub command_timeout_ms: Option<u64>,
}

impl ServeArgs {
	/// Config file (or defaults) with flags layered on top.
	pub fn bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
		let mut config = match &self.config {
			Some(path) => BridgeConfig::from_file(path)?,
			None => BridgeConfig::default(),
		};

		if let Some(port) = self.bot_port {
			config.bot.port = port;
		}
		if self.headless {
			config.bot.headless = true;
		}
		if let Some(chrome) = &self.chrome {
			config.bot.executable = Some(chrome.clone());
		}
		if let Some(dir) = &self.user_data_dir {
			config.bot.user_data_dir = Some(dir.clone());
		}
		if let Some(ms) = self.command_timeout_ms {
			config.relay.command_timeout_ms = ms;
			config.bot.command_timeout_ms = ms;
		}
		Ok(config)
	}
}

#[derive(Args, Debug, Clone)]
pub struct LaunchArgs {
	/// Remote debugging port
	#[arg(short, long, env = "BRIDGE_BOT_PORT", default_value_t = DEFAULT_DEBUG_PORT)]
	pub port: u16,

	/// Launch without a window
	#[arg(long)]
	pub headless: bool,

	/// Open this URL in a new tab once the browser is up
	#[arg(long, value_name = "URL")]
	pub url: Option<String>,

	/// Profile directory
	#[arg(long, value_name = "DIR")]
	pub user_data_dir: Option<PathBuf>,

	/// Browser executable
	#[arg(long, env = "BRIDGE_CHROME", value_name = "PATH")]
	pub chrome: Option<PathBuf>,
}

impl LaunchArgs {
	pub fn launch_options(&self) -> LaunchOptions {
		LaunchOptions {
			port: self.port,
			headless: self.headless,
			executable: self.chrome.clone(),
			user_data_dir: self.user_data_dir.clone(),
			..Default::default()
		}
	}
}
