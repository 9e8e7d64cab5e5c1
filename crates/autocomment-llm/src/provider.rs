use std::fmt;

use autocomment_core::Settings;
use reqwest::Client;

use crate::catalog::{list_models, select_model};
use crate::probe::is_reachable;
use crate::LlmError;

/// Which backend serves generation for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Local,
    Cloud,
}

/// Decide between the local endpoint and the cloud fallback.
///
/// The cloud is only used when the local endpoint is down and a cloud key is
/// configured. Down with no key is fatal.
pub fn decide(local_reachable: bool, settings: &Settings) -> Result<Route, LlmError> {
    if local_reachable {
        return Ok(Route::Local);
    }
    match settings.cloud_credential() {
        Some(_) => Ok(Route::Cloud),
        None => Err(LlmError::MissingCredential {
            endpoint: settings.endpoint.clone(),
        }),
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum Provider {
    Local {
        endpoint: String,
        model: String,
    },
    Cloud {
        model: String,
        api_key: String,
        base_url: Option<String>,
    },
}

impl Provider {
    pub fn route(&self) -> Route {
        match self {
            Provider::Local { .. } => Route::Local,
            Provider::Cloud { .. } => Route::Cloud,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Local { model, .. } | Provider::Cloud { model, .. } => model,
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Local { endpoint, model } => f
                .debug_struct("Local")
                .field("endpoint", endpoint)
                .field("model", model)
                .finish(),
            Provider::Cloud {
                model, base_url, ..
            } => f
                .debug_struct("Cloud")
                .field("model", model)
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Local { endpoint, model } => write!(f, "{model} (local, {endpoint})"),
            Provider::Cloud {
                model,
                base_url: Some(url),
                ..
            } => write!(f, "{model} (cloud, {url})"),
            Provider::Cloud { model, .. } => write!(f, "{model} (cloud)"),
        }
    }
}

/// Probe the local endpoint and settle on a provider for this run.
///
/// Locally, `model_override` wins, then catalog selection when
/// `auto_select_model` is on, then the configured model.
pub async fn resolve(
    client: &Client,
    settings: &Settings,
    model_override: Option<&str>,
) -> Result<Provider, LlmError> {
    let reachable = is_reachable(client, &settings.endpoint).await;
    match decide(reachable, settings)? {
        Route::Local => {
            let model = match model_override {
                Some(model) => model.to_string(),
                None if settings.auto_select_model => {
                    let models = list_models(client, &settings.endpoint).await?;
                    let chosen = select_model(&models)?;
                    log::info!(
                        "selected {} (rank {}) from {} installed model(s)",
                        chosen.reference,
                        chosen.rank(),
                        models.len()
                    );
                    chosen.reference.clone()
                }
                None => settings.model.clone(),
            };
            Ok(Provider::Local {
                endpoint: settings.endpoint.clone(),
                model,
            })
        }
        Route::Cloud => {
            log::warn!(
                "local LLM at {} is unreachable, falling back to the cloud API",
                settings.endpoint
            );
            Ok(Provider::Cloud {
                model: model_override
                    .map(str::to_string)
                    .unwrap_or_else(|| settings.cloud_model.clone()),
                api_key: settings.cloud_credential().unwrap_or_default().to_string(),
                base_url: settings.cloud_base_url.clone(),
            })
        }
    }
}
