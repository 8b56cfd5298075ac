//! Wire types for the browser bridge.
//!
//! Three vocabularies meet in the bridge and all of them are defined here:
//!
//! * [`cdp`] - Chrome DevTools Protocol frames and discovery-endpoint payloads
//! * [`relay`] - envelopes exchanged with the browser extension on the user channel
//! * [`types`] - the channel-agnostic data model returned to callers

pub mod cdp;
pub mod relay;
pub mod types;

pub use cdp::{BrowserVersion, CdpErrorBody, CdpMessage, CdpRequest, PageInfo};
pub use relay::{ClientCommand, ExtensionMessage, ExtensionRequest, ForwardedEvent, ParseError};
pub use types::*;
