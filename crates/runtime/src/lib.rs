//! Direct Chrome DevTools Protocol plumbing for the bot channel.
//!
//! * [`session::CdpSession`] - JSON-RPC over WebSocket with id correlation,
//!   per-command timeouts and event subscriptions
//! * [`launcher`] - discovery of a debuggable browser on a local port, and
//!   launching one when none answers

pub mod error;
pub mod launcher;
pub mod session;

pub use error::{CdpError, Result};
pub use launcher::{BrowserProcess, LaunchOptions};
pub use session::{CdpEvent, CdpSession};
