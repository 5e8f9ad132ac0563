//! Liveness endpoint for the hosting platform.
//!
//! Answers every `GET /` with a fixed body, independent of bot state: the
//! platform only needs to know the process is up.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const LIVENESS_BODY: &str = "✅ WATI AutoBot running successfully!";

pub fn router() -> Router {
	Router::new().route("/", get(|| async { LIVENESS_BODY }))
}

/// Serves [`router`] on all interfaces until `shutdown` fires.
pub async fn serve(port: u16, shutdown: CancellationToken) -> Result<()> {
	let addr = SocketAddr::from(([0, 0, 0, 0], port));
	let listener = TcpListener::bind(addr)
		.await
		.with_context(|| format!("Failed to bind liveness server to {addr}"))?;
	info!(target = "pilot", %addr, "🌍 Web server running!");

	axum::serve(listener, router())
		.with_graceful_shutdown(async move { shutdown.cancelled().await })
		.await
		.context("Liveness server error")
}
