//! Command-line front end for the browser bridge.
//!
//! `bridge serve` exposes a [`bridge::Bridge`] over HTTP and WebSocket;
//! `bridge launch` makes sure a debuggable browser is listening.

pub mod cli;
pub mod error;
pub mod launch;
pub mod logging;
pub mod server;
