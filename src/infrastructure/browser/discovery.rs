use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Extract the browser-level websocket endpoint from a `/json/version` payload.
pub fn parse_debugger_version(payload: &Value) -> Option<String> {
    payload
        .get("webSocketDebuggerUrl")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

/// Probe `http://localhost:{port}/json/version` on each port and return the
/// first websocket endpoint found.
pub async fn find_debugger_endpoint(ports: &[u16], timeout: Duration) -> Option<String> {
    let client = match Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Failed to build HTTP client for debugger discovery");
            return None;
        }
    };

    for port in ports {
        let url = format!("http://localhost:{}/json/version", port);
        let payload = match client.get(&url).send().await {
            Ok(response) => response.json::<Value>().await,
            Err(e) => {
                debug!(port, error = %e, "No debugger listening");
                continue;
            }
        };

        match payload {
            Ok(payload) => {
                if let Some(ws_url) = parse_debugger_version(&payload) {
                    info!(port, "Found browser debugging WebSocket");
                    return Some(ws_url);
                }
            }
            Err(e) => debug!(port, error = %e, "Debugger answered with invalid JSON"),
        }
    }

    warn!("Could not find an existing browser debugging session");
    None
}
