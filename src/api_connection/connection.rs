use log::debug;
use reqwest::Client;
use std::env;
use thiserror::Error;

use super::endpoints::{ChatCompletionRequest, ChatCompletionResponse, Provider};
use crate::config::GenerationSettings;

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("API key not found in environment: {0}")]
    MissingApiKey(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError {
        status: reqwest::StatusCode,
        error_body: String,
    },
}

impl Provider {
    pub fn openrouter(settings: &GenerationSettings) -> Self {
        Self::OpenRouter {
            api_key_env_var: settings.api_key_env_var.clone(),
            api_url: settings.api_url.clone(),
            site_url: settings.site_url.clone(),
            app_name: settings.app_name.clone(),
        }
    }

    pub async fn call_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError> {
        match self {
            Provider::OpenRouter {
                api_key_env_var,
                api_url,
                site_url,
                app_name,
            } => {
                let api_key = env::var(api_key_env_var)
                    .map_err(|_| ApiConnectionError::MissingApiKey(api_key_env_var.clone()))?;

                debug!(
                    "POST {} model={} messages={}",
                    api_url,
                    request.model,
                    request.messages.len()
                );

                let response = Client::new()
                    .post(api_url)
                    .bearer_auth(api_key)
                    .header("Content-Type", "application/json")
                    .header("HTTP-Referer", site_url)
                    .header("X-Title", app_name)
                    .json(request)
                    .send()
                    .await?;

                let status = response.status();
                if status.is_success() {
                    let chat_response = response.json::<ChatCompletionResponse>().await?;
                    debug!(
                        "Completion {} finished ({:?})",
                        chat_response.id,
                        chat_response.choices.first().and_then(|c| c.finish_reason.as_deref())
                    );
                    Ok(chat_response)
                } else {
                    let error_body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Failed to read error body".to_string());
                    Err(ApiConnectionError::ApiError { status, error_body })
                }
            }
        }
    }
}
