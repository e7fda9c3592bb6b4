use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient;
use super::{bullet_list, decode, invalid, request_structured, require_object, GenerationError};
use crate::api_connection::endpoints::{ChatMessage, Provider};
use crate::config::GenerationSettings;

const KIND: &str = "nutrition";

/// Per-serving nutrition estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    #[serde(alias = "kcal", alias = "energy_kcal", deserialize_with = "lenient::number")]
    pub calories: f64,
    #[serde(default, alias = "protein", deserialize_with = "lenient::opt_f64")]
    pub protein_g: Option<f64>,
    #[serde(default, alias = "carbohydrates", alias = "carbs", alias = "carbs_g", deserialize_with = "lenient::opt_f64")]
    pub carbohydrates_g: Option<f64>,
    #[serde(default, alias = "fat", deserialize_with = "lenient::opt_f64")]
    pub fat_g: Option<f64>,
    #[serde(default, alias = "fiber", deserialize_with = "lenient::opt_f64")]
    pub fiber_g: Option<f64>,
    #[serde(default, alias = "sugar", alias = "sugars_g", deserialize_with = "lenient::opt_f64")]
    pub sugar_g: Option<f64>,
    #[serde(default, alias = "sodium", deserialize_with = "lenient::opt_f64")]
    pub sodium_mg: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub servings: Option<u32>,
}

impl NutritionFacts {
    /// Energy implied by the macros using Atwater factors (4/4/9 kcal per gram).
    pub fn macro_calories(&self) -> Option<f64> {
        match (self.protein_g, self.carbohydrates_g, self.fat_g) {
            (None, None, None) => None,
            (p, c, f) => Some(p.unwrap_or(0.0) * 4.0 + c.unwrap_or(0.0) * 4.0 + f.unwrap_or(0.0) * 9.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NutritionRequest {
    pub ingredients: Vec<String>,
    pub servings: u32,
}

const NUTRITION_SYSTEM_PROMPT: &str = "You are a registered dietitian estimating nutrition facts.
Return exactly one JSON object and nothing else.
Properties, all numbers, per single serving:
\"calories\", \"protein_g\", \"carbohydrates_g\", \"fat_g\", \"fiber_g\", \"sugar_g\", \"sodium_mg\".
Also include \"servings\" as the integer number of servings the ingredients make.";

pub fn build_nutrition_messages(request: &NutritionRequest) -> Vec<ChatMessage> {
    let prompt = format!(
        "Estimate nutrition per serving for a dish that makes {} serving(s) from these ingredients:\n{}",
        request.servings.max(1),
        bullet_list(&request.ingredients)
    );
    vec![
        ChatMessage::system(NUTRITION_SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ]
}

pub fn validate_nutrition(value: Value) -> Result<NutritionFacts, GenerationError> {
    require_object(&value, KIND)?;
    // Some models nest the facts one level down.
    let value = match value.get("nutrition") {
        Some(inner) if inner.is_object() => inner.clone(),
        _ => value,
    };

    let facts: NutritionFacts = decode(value, KIND)?;
    if !facts.calories.is_finite() || facts.calories < 0.0 {
        return Err(invalid(KIND, format!("calories out of range: {}", facts.calories)));
    }
    Ok(facts)
}

pub async fn calculate_nutrition(
    provider: &Provider,
    settings: &GenerationSettings,
    request: &NutritionRequest,
) -> Result<NutritionFacts, GenerationError> {
    if request.ingredients.is_empty() {
        return Err(invalid(KIND, "no ingredients given"));
    }
    let value = request_structured(provider, settings, build_nutrition_messages(request)).await?;
    let facts = validate_nutrition(value)?;
    info!("Estimated {:.0} kcal per serving", facts.calories);
    Ok(facts)
}
