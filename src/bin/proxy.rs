//! Proxy binary entrypoint.
//!
//! CLI parsing, container orchestration, and TLS configuration are out of
//! scope; backend addresses and the bind port are read from
//! environment variables with documented defaults.

use std::net::SocketAddr;
use std::sync::Arc;

use mini_kvstore_v2::proxy::backend::Backend;
use mini_kvstore_v2::proxy::health;
use mini_kvstore_v2::proxy::server::{create_router, ProxyState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let bind_addr: SocketAddr = std::env::var("PROXY_BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;

    let backend_addrs: Vec<String> = std::env::var("PROXY_BACKENDS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if backend_addrs.is_empty() {
        anyhow::bail!("PROXY_BACKENDS must list at least one backend address, comma separated");
    }

    let trace_backend = std::env::var("PROXY_TRACE_BACKEND")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let backends = Arc::new(backend_addrs.into_iter().map(Backend::new).collect::<Vec<_>>());
    let client = reqwest::Client::new();

    health::spawn_probes(Arc::clone(&backends), client.clone());

    let state = ProxyState {
        backends,
        client,
        trace_backend,
    };
    let router = create_router(state);

    tracing::info!(%bind_addr, "proxy listening");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
