//! The proxy's axum router: selects a backend, best-effort forwards the
//! request, and sets the `lb-from` header when tracing is enabled.
//!
//! The forwarding path is deliberately thin -- a full reverse-proxy
//! implementation (streaming bodies both ways, connection reuse tuning,
//! websocket upgrades, etc.) is explicitly out of scope here.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;

use crate::proxy::backend::Backend;
use crate::proxy::select::choose_backend;

const LB_FROM_HEADER: &str = "lb-from";

#[derive(Clone)]
pub struct ProxyState {
    pub backends: Arc<Vec<Backend>>,
    pub client: reqwest::Client,
    pub trace_backend: bool,
}

pub fn create_router(state: ProxyState) -> Router {
    Router::new().fallback(any(forward)).with_state(state)
}

async fn forward(
    State(state): State<ProxyState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Response {
    let Some(backend) = choose_backend(&state.backends, &remote_addr.to_string()) else {
        return (StatusCode::SERVICE_UNAVAILABLE, "no healthy backend").into_response();
    };

    let url = format!("http://{}", backend.address);
    let upstream = state.client.post(&url).body(body).send().await;

    let mut response = match upstream {
        Ok(resp) => {
            let status = resp.status();
            let bytes = resp.bytes().await.unwrap_or_default();
            (status, bytes).into_response()
        }
        Err(e) => {
            tracing::warn!(backend = %backend.address, error = %e, "upstream forward failed");
            (StatusCode::BAD_GATEWAY, "upstream request failed").into_response()
        }
    };

    if state.trace_backend {
        if let Ok(value) = HeaderValue::from_str(&backend.address) {
            response.headers_mut().insert(LB_FROM_HEADER, value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_cloneable_for_axum() {
        let state = ProxyState {
            backends: Arc::new(vec![Backend::new("a:1")]),
            client: reqwest::Client::new(),
            trace_backend: true,
        };
        let _ = state.clone();
    }
}
