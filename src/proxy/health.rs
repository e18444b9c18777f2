//! Periodic backend health probing: `GET /health` every 10 seconds,
//! healthy iff HTTP 200.

use std::sync::Arc;
use std::time::Duration;

use crate::proxy::backend::Backend;

const PROBE_INTERVAL: Duration = Duration::from_secs(10);

/// Spawns one probing task per backend. The tasks run for the lifetime of
/// the proxy process; there is no shutdown signal since the proxy itself
/// has none.
pub fn spawn_probes(backends: Arc<Vec<Backend>>, client: reqwest::Client) {
    for i in 0..backends.len() {
        let backends = Arc::clone(&backends);
        let client = client.clone();
        tokio::spawn(async move {
            probe_loop(backends, i, client).await;
        });
    }
}

async fn probe_loop(backends: Arc<Vec<Backend>>, index: usize, client: reqwest::Client) {
    let mut interval = tokio::time::interval(PROBE_INTERVAL);
    loop {
        interval.tick().await;
        let backend = &backends[index];
        let healthy = probe_once(&client, &backend.address).await;
        backend.set_healthy(healthy);
    }
}

async fn probe_once(client: &reqwest::Client, address: &str) -> bool {
    let url = format!("http://{address}/health");
    match client.get(&url).send().await {
        Ok(resp) => resp.status().as_u16() == 200,
        Err(e) => {
            tracing::debug!(address, error = %e, "health probe failed");
            false
        }
    }
}
