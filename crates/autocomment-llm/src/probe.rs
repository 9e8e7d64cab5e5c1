use std::time::Duration;

use reqwest::Client;

use crate::{api_url, TAGS_PATH};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Check whether the local endpoint answers its model listing within [`PROBE_TIMEOUT`].
///
/// Transport errors, timeouts and non-success statuses all count as unreachable.
pub async fn is_reachable(client: &Client, endpoint: &str) -> bool {
    let url = api_url(endpoint, TAGS_PATH);
    match client.get(&url).timeout(PROBE_TIMEOUT).send().await {
        Ok(response) if response.status().is_success() => {
            log::info!("connected to local LLM at {endpoint}");
            true
        }
        Ok(response) => {
            log::debug!("probe {url} returned HTTP {}", response.status());
            false
        }
        Err(e) => {
            log::debug!("probe {url} failed: {e}");
            false
        }
    }
}
