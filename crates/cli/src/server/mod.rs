//! HTTP API and WebSocket endpoints around one [`Bridge`].

mod api;
mod response;
mod sockets;

use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use bridge::Bridge;
use tokio::net::TcpListener;
use tracing::info;

use crate::cli::ServeArgs;

#[derive(Clone)]
pub struct AppState {
	pub bridge: Bridge,
}

pub fn router(bridge: Bridge) -> Router {
	Router::new()
		.route("/", get(sockets::health))
		.route("/status", get(api::status))
		.route("/bot/launch", post(api::launch_bot))
		.route("/tabs", get(api::list_tabs))
		.route("/tabs/{tab_id}/snapshot", post(api::snapshot))
		.route("/tabs/{tab_id}/find", post(api::find))
		.route("/tabs/{tab_id}/screenshot", post(api::screenshot))
		.route("/tabs/{tab_id}/navigate", post(api::navigate))
		.route("/tabs/{tab_id}/click", post(api::click))
		.route("/tabs/{tab_id}/fill", post(api::fill))
		.route("/tabs/{tab_id}/press", post(api::press))
		.route("/tabs/{tab_id}/scroll", post(api::scroll))
		.route("/tabs/{tab_id}/wait", post(api::wait))
		.route("/tabs/{tab_id}/evaluate", post(api::evaluate))
		.route("/tabs/{tab_id}/upload", post(api::upload))
		.route("/tabs/{tab_id}/dialog", post(api::dialog))
		.route("/tabs/{tab_id}/tool", post(api::tool))
		.route("/extension", get(sockets::extension))
		.route("/cdp", get(sockets::cdp))
		.route("/cdp/{client_id}", get(sockets::cdp_named))
		.route("/json/version", get(sockets::json_version))
		.route("/json/list", get(sockets::json_list))
		.with_state(AppState { bridge })
}

/// Serves until `shutdown` resolves.
pub async fn serve(
	listener: TcpListener,
	bridge: Bridge,
	shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
	axum::serve(listener, router(bridge).into_make_service())
		.with_graceful_shutdown(shutdown)
		.await
		.context("Bridge server error")
}

/// `bridge serve`: build the bridge from config and flags, bind, serve until
/// SIGINT or SIGTERM.
pub async fn run(args: &ServeArgs) -> Result<()> {
	let config = args.bridge_config().context("Loading bridge config")?;
	let bridge = Bridge::new(&config);

	let addr: SocketAddr = format!("{}:{}", args.host, args.port)
		.parse()
		.with_context(|| format!("Invalid host/port combination: {}:{}", args.host, args.port))?;
	let listener = TcpListener::bind(addr)
		.await
		.with_context(|| format!("Failed to bind bridge server to {addr}"))?;

	info!(
		target = "bridge.http",
		%addr,
		bot_port = config.bot.port,
		command_timeout_ms = config.relay.command_timeout_ms,
		"bridge server listening"
	);
	serve(listener, bridge, shutdown_signal()).await?;
	info!(target = "bridge.http", "bridge server stopped");
	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if tokio::signal::ctrl_c().await.is_err() {
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		use tokio::signal::unix::{SignalKind, signal};
		match signal(SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(_) => std::future::pending::<()>().await,
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => info!(target = "bridge.http", "received SIGINT, shutting down"),
		_ = terminate => info!(target = "bridge.http", "received SIGTERM, shutting down"),
	}
}
