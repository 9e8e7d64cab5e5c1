use std::cmp::Reverse;

use reqwest::Client;
use serde::Deserialize;

use crate::probe::PROBE_TIMEOUT;
use crate::{api_url, LlmError, TAGS_PATH};

/// Selection priority for known model families. Higher wins.
pub const MODEL_RANKS: &[(&str, u32)] = &[
    ("dolphin-mixtral", 10),
    ("mixtral", 9),
    ("llama3.1", 8),
    ("llama3", 7),
    ("codellama", 6),
    ("mistral", 5),
    ("neural-chat", 4),
    ("llama2", 3),
    ("orca-mini", 2),
];

/// Rank given to models missing from [`MODEL_RANKS`].
pub const DEFAULT_RANK: u32 = 1;

/// A model installed on the local endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    /// Listing name cut at the first `:`, used for ranking.
    pub name: String,
    /// Full listing name including the tag, sent in requests.
    pub reference: String,
}

impl ModelDescriptor {
    pub fn from_listing(listing: &str) -> Self {
        let name = listing.split(':').next().unwrap_or(listing);
        Self {
            name: name.to_string(),
            reference: listing.to_string(),
        }
    }

    pub fn rank(&self) -> u32 {
        rank_of(&self.name)
    }
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

pub fn rank_of(name: &str) -> u32 {
    MODEL_RANKS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, rank)| *rank)
        .unwrap_or(DEFAULT_RANK)
}

/// List the models installed on the local endpoint, in listing order.
pub async fn list_models(
    client: &Client,
    endpoint: &str,
) -> Result<Vec<ModelDescriptor>, LlmError> {
    let url = api_url(endpoint, TAGS_PATH);
    let response = client
        .get(&url)
        .timeout(PROBE_TIMEOUT)
        .send()
        .await
        .map_err(|source| LlmError::Transport {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(LlmError::Status { url, status });
    }

    let body = response.text().await.map_err(|source| LlmError::Transport {
        url: url.clone(),
        source,
    })?;
    parse_listing(&body).map_err(|reason| LlmError::InvalidResponse { url, reason })
}

fn parse_listing(body: &str) -> Result<Vec<ModelDescriptor>, String> {
    let tags: TagList = serde_json::from_str(body).map_err(|e| e.to_string())?;
    Ok(tags
        .models
        .iter()
        .map(|m| ModelDescriptor::from_listing(&m.name))
        .collect())
}

/// Pick the highest-ranked model. Ties keep listing order.
pub fn select_model(models: &[ModelDescriptor]) -> Result<&ModelDescriptor, LlmError> {
    let mut ranked: Vec<&ModelDescriptor> = models.iter().collect();
    // sort_by_key is stable, so equal ranks stay in listing order
    ranked.sort_by_key(|m| Reverse(m.rank()));
    ranked.first().copied().ok_or(LlmError::NoModels)
}
