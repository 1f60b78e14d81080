use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use {
    anyhow::Context,
    axum::{
        Json, Router,
        extract::{DefaultBodyLimit, State},
        response::IntoResponse,
        routing::get,
    },
    tokio::net::TcpListener,
    tower_http::trace::TraceLayer,
    tracing::info,
    wayfarer_config::{ServerConfig, WayfarerConfig},
};

use crate::{
    handler::{proxy_get, proxy_post},
    state::ProxyState,
};

// ── Router ───────────────────────────────────────────────────────────────────

/// Build the proxy router (shared between production startup and tests).
///
/// The proxy path answers GET and POST; any other method gets 405.
pub fn build_proxy_app(state: Arc<ProxyState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_request_body_bytes);
    Router::new()
        .route("/health", get(health_handler))
        .route(&state.proxy_path, get(proxy_get).post(proxy_post))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<ProxyState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
    }))
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Bind and serve until `shutdown` resolves.
pub async fn start_proxy(
    config: &WayfarerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let state = ProxyState::from_config(config).context("failed to build proxy state")?;
    let app = build_proxy_app(state);

    let addr = bind_addr(&config.server)?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, proxy_path = %config.server.proxy_path, "wayfarer listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")?;
    info!("wayfarer stopped");
    Ok(())
}

/// `bind` is a bare IPv4 or IPv6 address; brackets around IPv6 are tolerated.
fn bind_addr(server: &ServerConfig) -> anyhow::Result<SocketAddr> {
    let host = server.bind.trim().trim_start_matches('[').trim_end_matches(']');
    let ip: IpAddr = host
        .parse()
        .with_context(|| format!("invalid bind address {:?}", server.bind))?;
    Ok(SocketAddr::new(ip, server.port))
}
