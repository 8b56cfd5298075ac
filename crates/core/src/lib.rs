//! bridge: drive a browser from outside through one of two channels.
//!
//! The **user channel** is the person's own browser, reached through a browser
//! extension that connects to the [`RelayHub`] and forwards CDP commands into
//! attached tabs. The **bot channel** is a browser process the bridge finds or
//! launches on a local debugging port and talks to directly.
//!
//! [`Bridge`] picks a channel per call and runs every page action the same way
//! on either one. Elements are addressed by refs (`e12`) that the page scripts
//! in [`scripts`] mint as DOM attributes while building a snapshot.
//!
//! # Main Types
//!
//! - [`Bridge`] - channel selection plus every page action
//! - [`RelayHub`] - extension connection, pending requests, downstream CDP clients
//! - [`channel::BrowserChannel`] - the seam both channels implement
//! - [`actions::TabHandle`] - one tab on one channel
//! - [`BridgeConfig`] - relay, bot and timing settings
//! - [`BridgeError`] - classified failures, each with a stable code

pub mod actions;
mod bridge;
pub mod channel;
pub mod config;
pub mod error;
pub mod relay;
pub mod scripts;

pub use actions::{ClickOptions, ClickTarget, ScreenshotOptions, SnapshotOptions, TabHandle};
pub use bridge::Bridge;
pub use channel::{BotBrowser, BrowserChannel, Channel, ExtensionChannel, select_channel};
pub use config::{ActionTiming, BotConfig, BridgeConfig, ConfigError, RelayConfig};
pub use error::{BridgeError, Result};
pub use relay::{ClientLink, ConnectedTarget, ExtensionLink, Outbound, RelayHub};
