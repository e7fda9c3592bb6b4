use base64::{engine::general_purpose, Engine};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::lenient;
use super::nutrition::NutritionFacts;
use super::recipe::{partial_nutrition, GeneratedRecipe, Ingredient};
use super::{decode, invalid, request_structured, require_object, require_text, GenerationError};
use crate::api_connection::endpoints::{ChatMessage, Provider};
use crate::config::GenerationSettings;

const KIND: &str = "image analysis";
/// Hosted vision endpoints reject inline images much above this.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    #[serde(alias = "name", alias = "title", alias = "dish")]
    pub dish_name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default, alias = "steps", deserialize_with = "lenient::text_list")]
    pub instructions: Vec<String>,
    #[serde(default, alias = "nutrition", deserialize_with = "partial_nutrition")]
    pub estimated_nutrition: Option<NutritionFacts>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub confidence: Option<f64>,
}

impl ImageAnalysis {
    /// A full recipe when the model reconstructed both ingredients and steps.
    pub fn to_recipe(&self) -> Option<GeneratedRecipe> {
        if self.ingredients.is_empty() || self.instructions.is_empty() {
            return None;
        }
        Some(GeneratedRecipe {
            title: self.dish_name.clone(),
            description: self.description.clone(),
            ingredients: self.ingredients.clone(),
            instructions: self.instructions.clone(),
            prep_time: None,
            cook_time: None,
            servings: self.estimated_nutrition.as_ref().and_then(|n| n.servings),
            difficulty: None,
            cuisine: None,
            tags: Vec::new(),
            nutrition: self.estimated_nutrition.clone(),
        })
    }
}

const IMAGE_SYSTEM_PROMPT: &str = "You are a culinary expert who identifies dishes from photos.
Return exactly one JSON object and nothing else, with these properties:
- \"dish_name\": string
- \"description\": string
- \"ingredients\": array of objects with \"name\", \"quantity\", \"unit\", \"notes\"
- \"instructions\": array of strings describing how to recreate the dish
- \"estimated_nutrition\": object with numeric \"calories\", \"protein_g\", \"carbohydrates_g\", \"fat_g\" per serving and integer \"servings\"
- \"confidence\": number between 0 and 1";

pub fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

pub fn image_data_url(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{};base64,{}", mime_type, general_purpose::STANDARD.encode(bytes))
}

pub fn build_image_messages(bytes: &[u8], mime_type: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(IMAGE_SYSTEM_PROMPT),
        ChatMessage::user_with_image(
            "Identify this dish and reconstruct its recipe and nutrition.",
            image_data_url(bytes, mime_type),
        ),
    ]
}

pub fn validate_image_analysis(value: Value) -> Result<ImageAnalysis, GenerationError> {
    require_object(&value, KIND)?;
    require_text(&value, KIND, &["dish_name", "name", "title", "dish"])?;
    let mut analysis: ImageAnalysis = decode(value, KIND)?;
    analysis.confidence = analysis.confidence.map(|c| c.clamp(0.0, 1.0));
    Ok(analysis)
}

pub async fn analyze_food_image(
    provider: &Provider,
    settings: &GenerationSettings,
    bytes: &[u8],
    mime_type: &str,
) -> Result<ImageAnalysis, GenerationError> {
    if bytes.is_empty() {
        return Err(invalid(KIND, "image is empty"));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(invalid(
            KIND,
            format!("image is {} bytes, limit is {}", bytes.len(), MAX_IMAGE_BYTES),
        ));
    }
    debug!("Analyzing {} image of {} bytes", mime_type, bytes.len());

    let value = request_structured(provider, settings, build_image_messages(bytes, mime_type)).await?;
    let analysis = validate_image_analysis(value)?;
    info!(
        "Identified '{}' (confidence {:?})",
        analysis.dish_name, analysis.confidence
    );
    Ok(analysis)
}
