pub mod catalog;
pub mod engine;
mod error;
pub mod probe;
mod prompt;
pub mod provider;
#[cfg(test)]
mod testing;

use autocomment_core::{Settings, Task};
use reqwest::Client;

pub use catalog::{rank_of, select_model, ModelDescriptor};
pub use error::LlmError;
pub use provider::{decide, Provider, Route};

pub(crate) const TAGS_PATH: &str = "/api/tags";
pub(crate) const GENERATE_PATH: &str = "/api/generate";

pub(crate) fn api_url(endpoint: &str, path: &str) -> String {
    format!("{}{}", endpoint.trim_end_matches('/'), path)
}

/// Models installed on the local endpoint, in listing order. Never falls back to the cloud.
pub async fn local_models(endpoint: &str) -> Result<Vec<ModelDescriptor>, LlmError> {
    catalog::list_models(&Client::new(), endpoint).await
}

/// A provider settled for the run, plus the task every file is put through.
pub struct Assistant {
    client: Client,
    provider: Provider,
    settings: Settings,
    task: Task,
}

impl Assistant {
    /// Probe the local endpoint and pick a provider, falling back to the cloud if needed.
    pub async fn connect(
        settings: Settings,
        task: Task,
        model_override: Option<&str>,
    ) -> Result<Self, LlmError> {
        let client = Client::new();
        let provider = provider::resolve(&client, &settings, model_override).await?;
        Ok(Self {
            client,
            provider,
            settings,
            task,
        })
    }

    /// Use an already-decided provider without probing.
    pub fn new(settings: Settings, provider: Provider, task: Task) -> Self {
        Self {
            client: Client::new(),
            provider,
            settings,
            task,
        }
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn task(&self) -> Task {
        self.task
    }

    /// Run the task over `source`. Errors are returned to the caller.
    pub async fn complete(&self, source: &str, language: &str) -> Result<String, LlmError> {
        let system = prompt::system_prompt(self.task, language);
        let user_msg = prompt::user_message(source, language);

        log::debug!("sending {} to {}", self.task, self.provider);

        let text = engine::generate(
            &self.client,
            &self.provider,
            &self.settings,
            &system,
            &user_msg,
        )
        .await?;

        if self.task.produces_report() {
            Ok(text)
        } else {
            Ok(prompt::strip_code_fence(&text).to_string())
        }
    }

    /// Like [`Assistant::complete`], but any failure hands back `source` unchanged.
    pub async fn annotate(&self, source: &str, language: &str) -> String {
        match self.complete(source, language).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("generation failed, keeping original content: {e}");
                source.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{spawn, MockEndpoint};
    use axum::http::StatusCode;

    const SOURCE: &str = "def add(a, b):\n    return a + b\n";

    fn settings_for(url: &str) -> Settings {
        Settings {
            endpoint: url.to_string(),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn connect_selects_highest_ranked_local_model() {
        let server = spawn(MockEndpoint::with_models(&[
            "mistral:latest",
            "dolphin-mixtral:8x7b",
            "phi3:mini",
        ]))
        .await;
        let assistant = Assistant::connect(settings_for(&server.url), Task::Comment, None)
            .await
            .expect("connect");
        assert_eq!(
            assistant.provider(),
            &Provider::Local {
                endpoint: server.url.clone(),
                model: "dolphin-mixtral:8x7b".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn model_override_and_configured_model_skip_selection() {
        let server = spawn(MockEndpoint::with_models(&["mistral:latest"])).await;

        let assistant = Assistant::connect(settings_for(&server.url), Task::Comment, Some("qwen2"))
            .await
            .expect("connect");
        assert_eq!(assistant.provider().model(), "qwen2");

        let settings = Settings {
            auto_select_model: false,
            model: "codellama".to_string(),
            ..settings_for(&server.url)
        };
        let assistant = Assistant::connect(settings, Task::Comment, None)
            .await
            .expect("connect");
        assert_eq!(assistant.provider().model(), "codellama");
    }

    #[tokio::test]
    async fn reachable_endpoint_without_models_is_fatal() {
        let server = spawn(MockEndpoint::with_models(&[])).await;
        let err = Assistant::connect(settings_for(&server.url), Task::Comment, None)
            .await
            .err()
            .expect("no models");
        assert!(matches!(err, LlmError::NoModels));
    }

    #[tokio::test]
    async fn unreachable_without_key_stops_before_generating() {
        let server = spawn(MockEndpoint::down()).await;
        let err = Assistant::connect(settings_for(&server.url), Task::Comment, None)
            .await
            .err()
            .expect("missing credential");
        assert!(matches!(err, LlmError::MissingCredential { .. }));
        assert_eq!(server.endpoint.generate_calls(), 0);
    }

    #[tokio::test]
    async fn unreachable_with_key_routes_generation_to_cloud() {
        let server = spawn(MockEndpoint::down().generating("# Set x.\nx = 1")).await;
        let settings = Settings {
            cloud_api_key: Some("sk-test".to_string()),
            cloud_model: "gpt-4o-mini".to_string(),
            cloud_base_url: Some(format!("{}/v1", server.url)),
            temperature: 0.25,
            max_tokens: 700,
            ..settings_for(&server.url)
        };
        let assistant = Assistant::connect(settings, Task::Comment, None)
            .await
            .expect("connect");
        assert_eq!(assistant.provider().route(), Route::Cloud);
        assert_eq!(assistant.provider().model(), "gpt-4o-mini");

        let result = assistant.annotate("x = 1", "Python").await;
        assert_eq!(result, "# Set x.\nx = 1");
        assert_eq!(server.endpoint.generate_calls(), 0);
        assert_eq!(server.endpoint.chat_calls(), 1);

        let (auth, body) = server.endpoint.last_chat().expect("chat request");
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0.25);
        assert_eq!(body["max_tokens"], 700);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][0]["content"]
            .as_str()
            .expect("system content")
            .contains("Python code"));
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Python code:\n```\nx = 1\n```");
    }

    #[tokio::test]
    async fn cloud_failure_keeps_input() {
        let server = spawn(MockEndpoint::down().failing_with(StatusCode::BAD_GATEWAY)).await;
        let settings = Settings {
            cloud_api_key: Some("sk-test".to_string()),
            cloud_base_url: Some(format!("{}/v1/", server.url)),
            ..settings_for(&server.url)
        };
        let assistant = Assistant::connect(settings, Task::Comment, None)
            .await
            .expect("connect");
        assert_eq!(assistant.annotate(SOURCE, "Python").await, SOURCE);
        assert_eq!(server.endpoint.chat_calls(), 1);
    }

    #[tokio::test]
    async fn annotate_returns_generated_text() {
        let server = spawn(
            MockEndpoint::with_models(&["mistral:latest"])
                .generating("```python\n# Add two numbers.\ndef add(a, b):\n    return a + b\n```"),
        )
        .await;
        let assistant = Assistant::connect(settings_for(&server.url), Task::Comment, None)
            .await
            .expect("connect");
        let result = assistant.annotate(SOURCE, "Python").await;
        assert_eq!(result, "# Add two numbers.\ndef add(a, b):\n    return a + b");

        let body = server.endpoint.last_generate().expect("request");
        let prompt = body["prompt"].as_str().expect("prompt");
        assert!(prompt.contains("Python code"));
        assert!(prompt.contains(SOURCE));
    }

    #[tokio::test]
    async fn annotate_keeps_input_on_error_status() {
        let server = spawn(
            MockEndpoint::with_models(&["mistral:latest"])
                .failing_with(StatusCode::INTERNAL_SERVER_ERROR),
        )
        .await;
        let assistant = Assistant::connect(settings_for(&server.url), Task::Comment, None)
            .await
            .expect("connect");
        assert_eq!(assistant.annotate(SOURCE, "Python").await, SOURCE);
        assert_eq!(server.endpoint.generate_calls(), 1);
    }

    #[tokio::test]
    async fn annotate_keeps_input_on_transport_error() {
        let provider = Provider::Local {
            endpoint: "http://127.0.0.1:1".to_string(),
            model: "mistral".to_string(),
        };
        let assistant = Assistant::new(Settings::default(), provider, Task::Comment);
        assert_eq!(assistant.annotate(SOURCE, "Python").await, SOURCE);
        assert!(assistant.complete(SOURCE, "Python").await.is_err());
    }

    #[tokio::test]
    async fn report_tasks_keep_markdown_fences() {
        let report = "## Findings\n\n```python\nreturn a - b\n```";
        let server = spawn(MockEndpoint::with_models(&["llama3"]).generating(report)).await;
        let assistant = Assistant::connect(settings_for(&server.url), Task::Review, None)
            .await
            .expect("connect");
        assert_eq!(assistant.complete(SOURCE, "Python").await.expect("report"), report);
    }

    #[test]
    fn api_url_tolerates_trailing_slash() {
        assert_eq!(
            api_url("http://localhost:11434/", TAGS_PATH),
            "http://localhost:11434/api/tags"
        );
    }
}
