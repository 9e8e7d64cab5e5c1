use std::time::Duration;

use autocomment_core::Settings;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{api_url, LlmError, Provider, GENERATE_PATH};

/// Local inference can take minutes on CPU-only machines.
pub const GENERATE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_gpu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    main_gpu: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Used when `cloud_base_url` is unset.
pub const DEFAULT_CLOUD_BASE_URL: &str = "https://api.openai.com/v1";
const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Run one non-streamed completion against `provider` and return the trimmed text.
pub async fn generate(
    client: &Client,
    provider: &Provider,
    settings: &Settings,
    system: &str,
    user_msg: &str,
) -> Result<String, LlmError> {
    let text = match provider {
        Provider::Local { endpoint, model } => {
            let prompt = format!("{system}\n\n{user_msg}");
            generate_local(client, endpoint, model, settings, &prompt).await?
        }
        Provider::Cloud {
            model,
            api_key,
            base_url,
        } => {
            generate_cloud(
                client,
                model,
                api_key,
                base_url.as_deref(),
                settings,
                system,
                user_msg,
            )
            .await?
        }
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text.to_string())
}

async fn generate_local(
    client: &Client,
    endpoint: &str,
    model: &str,
    settings: &Settings,
    prompt: &str,
) -> Result<String, LlmError> {
    let url = api_url(endpoint, GENERATE_PATH);
    let request = GenerateRequest {
        model,
        prompt,
        stream: false,
        options: GenerateOptions {
            temperature: settings.temperature,
            num_predict: settings.max_tokens,
            num_gpu: settings.num_gpu,
            main_gpu: settings.main_gpu,
        },
    };

    let response = client
        .post(&url)
        .timeout(GENERATE_TIMEOUT)
        .json(&request)
        .send()
        .await
        .map_err(|source| LlmError::Transport {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        if let Ok(body) = response.text().await {
            log::debug!("{url} error body: {body}");
        }
        return Err(LlmError::Status { url, status });
    }

    let body = response.text().await.map_err(|source| LlmError::Transport {
        url: url.clone(),
        source,
    })?;
    let parsed: GenerateResponse =
        serde_json::from_str(&body).map_err(|e| LlmError::InvalidResponse {
            url,
            reason: e.to_string(),
        })?;
    Ok(parsed.response)
}

async fn generate_cloud(
    client: &Client,
    model: &str,
    api_key: &str,
    base_url: Option<&str>,
    settings: &Settings,
    system: &str,
    user_msg: &str,
) -> Result<String, LlmError> {
    let base = base_url.unwrap_or(DEFAULT_CLOUD_BASE_URL);
    let url = api_url(base, CHAT_COMPLETIONS_PATH);
    let request = ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: user_msg,
            },
        ],
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    };

    let response = client
        .post(&url)
        .timeout(GENERATE_TIMEOUT)
        .bearer_auth(api_key)
        .json(&request)
        .send()
        .await
        .map_err(|source| LlmError::Transport {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        if let Ok(body) = response.text().await {
            log::debug!("{url} error body: {body}");
        }
        return Err(LlmError::Status { url, status });
    }

    let body = response.text().await.map_err(|source| LlmError::Transport {
        url: url.clone(),
        source,
    })?;
    let parsed: ChatResponse =
        serde_json::from_str(&body).map_err(|e| LlmError::InvalidResponse {
            url,
            reason: e.to_string(),
        })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(LlmError::EmptyResponse)
}
