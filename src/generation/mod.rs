//! Generation call sites. Each one builds a prompt, recovers the JSON object from the
//! model's reply and then applies its own shape checks before decoding.

pub mod image;
pub mod lenient;
pub mod meal_plan;
pub mod nutrition;
pub mod recipe;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::api_connection::endpoints::{ChatCompletionRequest, ChatMessage, Provider, ResponseFormat};
use crate::api_connection::ApiConnectionError;
use crate::config::GenerationSettings;
use crate::json_recovery::{recover_structured, RecoveryError, RecoveryStage};

pub use image::{analyze_food_image, ImageAnalysis};
pub use meal_plan::{generate_meal_plan, MealPlan, MealPlanRequest};
pub use nutrition::{calculate_nutrition, NutritionFacts, NutritionRequest};
pub use recipe::{generate_recipe, GeneratedRecipe, Ingredient, RecipeRequest};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Api(#[from] ApiConnectionError),
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("could not recover JSON from model output ({stage} stage): {source}")]
    Recovery {
        stage: RecoveryStage,
        #[source]
        source: RecoveryError,
    },
    #[error("generated {kind} is invalid: {reason}")]
    Invalid { kind: &'static str, reason: String },
}

impl From<RecoveryError> for GenerationError {
    fn from(source: RecoveryError) -> Self {
        GenerationError::Recovery {
            stage: source.stage(),
            source,
        }
    }
}

pub(crate) fn invalid(kind: &'static str, reason: impl Into<String>) -> GenerationError {
    GenerationError::Invalid {
        kind,
        reason: reason.into(),
    }
}

/// Sends one request and returns the JSON object recovered from the reply.
pub async fn request_structured(
    provider: &Provider,
    settings: &GenerationSettings,
    messages: Vec<ChatMessage>,
) -> Result<Value, GenerationError> {
    let request = ChatCompletionRequest {
        model: settings.model.clone(),
        messages,
        response_format: Some(ResponseFormat::json_object()),
        temperature: Some(settings.temperature),
        max_tokens: Some(settings.max_tokens),
    };

    let response = provider.call_chat_completion(&request).await?;
    if response.was_truncated() {
        warn!(
            "Completion {} hit the {} token limit, output may be cut short",
            response.id, settings.max_tokens
        );
    }

    let content = response.first_content().ok_or(GenerationError::EmptyResponse)?;
    debug!("Raw model output ({} chars)", content.len());

    recover_structured(content).map_err(|e| {
        warn!("JSON recovery failed at {} stage: {}", e.stage(), e);
        GenerationError::from(e)
    })
}

/// Returns the first of `keys` present on `value` as a non-empty array.
pub(crate) fn require_array<'a>(
    value: &'a Value,
    kind: &'static str,
    keys: &[&str],
) -> Result<&'a Vec<Value>, GenerationError> {
    let field = keys.iter().find_map(|key| value.get(*key));
    match field {
        Some(Value::Array(items)) if !items.is_empty() => Ok(items),
        Some(Value::Array(_)) => Err(invalid(kind, format!("'{}' is empty", keys[0]))),
        Some(_) => Err(invalid(kind, format!("'{}' must be an array", keys[0]))),
        None => Err(invalid(kind, format!("missing '{}'", keys[0]))),
    }
}

pub(crate) fn require_text(value: &Value, kind: &'static str, keys: &[&str]) -> Result<(), GenerationError> {
    let text = keys
        .iter()
        .find_map(|key| value.get(*key))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if text.is_empty() {
        return Err(invalid(kind, format!("missing '{}'", keys[0])));
    }
    Ok(())
}

pub(crate) fn require_object(value: &Value, kind: &'static str) -> Result<(), GenerationError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(invalid(kind, "expected a JSON object"))
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value, kind: &'static str) -> Result<T, GenerationError> {
    serde_json::from_value(value).map_err(|e| invalid(kind, e.to_string()))
}

pub(crate) fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}
