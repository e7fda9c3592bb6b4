use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient;
use super::nutrition::NutritionFacts;
use super::{
    bullet_list, decode, request_structured, require_array, require_object, require_text,
    GenerationError,
};
use crate::api_connection::endpoints::{ChatMessage, Provider};
use crate::config::GenerationSettings;

const KIND: &str = "recipe";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: String,
    pub unit: String,
    pub notes: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IngredientRepr {
    Text(String),
    Detailed {
        #[serde(alias = "ingredient", alias = "item", alias = "ingredient_name")]
        name: String,
        #[serde(default, alias = "amount", deserialize_with = "lenient::string")]
        quantity: String,
        #[serde(default, deserialize_with = "lenient::string")]
        unit: String,
        #[serde(default, alias = "preparation_notes", alias = "note", deserialize_with = "lenient::string")]
        notes: String,
    },
}

impl From<IngredientRepr> for Ingredient {
    fn from(repr: IngredientRepr) -> Self {
        match repr {
            IngredientRepr::Text(text) => Ingredient {
                name: text.trim().to_string(),
                quantity: String::new(),
                unit: String::new(),
                notes: String::new(),
            },
            IngredientRepr::Detailed {
                name,
                quantity,
                unit,
                notes,
            } => Ingredient {
                name: name.trim().to_string(),
                quantity,
                unit,
                notes,
            },
        }
    }
}

impl<'de> Deserialize<'de> for Ingredient {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        IngredientRepr::deserialize(deserializer).map(Ingredient::from)
    }
}

impl Ingredient {
    /// "2 cups flour (sifted)"; plain-text ingredients come back unchanged.
    pub fn display_line(&self) -> String {
        let mut line = [self.quantity.as_str(), self.unit.as_str(), self.name.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        if !self.notes.is_empty() {
            line.push_str(&format!(" ({})", self.notes));
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedRecipe {
    #[serde(alias = "recipe_title", alias = "name")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    pub ingredients: Vec<Ingredient>,
    #[serde(alias = "steps", deserialize_with = "lenient::text_list")]
    pub instructions: Vec<String>,
    #[serde(default, alias = "prepTime", deserialize_with = "lenient::opt_string")]
    pub prep_time: Option<String>,
    #[serde(default, alias = "cookTime", deserialize_with = "lenient::opt_string")]
    pub cook_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub servings: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub difficulty: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub cuisine: Option<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "partial_nutrition")]
    pub nutrition: Option<NutritionFacts>,
}

/// Nutrition is a bonus on a recipe; an unusable block is dropped rather than failing the recipe.
pub(crate) fn partial_nutrition<'de, D>(deserializer: D) -> Result<Option<NutritionFacts>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeRequest {
    /// Free-form description of what the user wants.
    pub prompt: String,
    pub ingredients: Vec<String>,
    pub cuisine: Option<String>,
    pub dietary: Vec<String>,
    pub servings: Option<u32>,
    pub max_minutes: Option<u32>,
}

const RECIPE_SYSTEM_PROMPT: &str = "You are a professional chef and recipe writer.
Return exactly one JSON object and nothing else: no markdown fences, no commentary.
The object must have these properties:
- \"title\": string
- \"description\": one or two sentence string
- \"ingredients\": array of objects with string properties \"name\", \"quantity\", \"unit\", \"notes\" (use an empty string when not applicable)
- \"instructions\": array of strings, one step each, in order
- \"prep_time\": string such as \"15 minutes\"
- \"cook_time\": string
- \"servings\": integer
- \"difficulty\": one of \"Easy\", \"Medium\", \"Hard\"
- \"cuisine\": string
- \"tags\": array of short strings (e.g. \"Vegan\", \"Quick\")
- \"nutrition\": object with numeric \"calories\", \"protein_g\", \"carbohydrates_g\", \"fat_g\", \"fiber_g\" per serving";

pub fn build_recipe_messages(request: &RecipeRequest) -> Vec<ChatMessage> {
    let mut prompt = String::new();
    let description = request.prompt.trim();
    if description.is_empty() {
        prompt.push_str("Create an original home-cooking recipe.\n");
    } else {
        prompt.push_str(&format!("Create a recipe for: {}\n", description));
    }
    if !request.ingredients.is_empty() {
        prompt.push_str(&format!(
            "\nUse these available ingredients (pantry staples may be added):\n{}\n",
            bullet_list(&request.ingredients)
        ));
    }
    if let Some(cuisine) = &request.cuisine {
        prompt.push_str(&format!("\nCuisine: {}\n", cuisine));
    }
    if !request.dietary.is_empty() {
        prompt.push_str(&format!(
            "\nThe recipe must respect these dietary requirements: {}\n",
            request.dietary.join(", ")
        ));
    }
    if let Some(servings) = request.servings {
        prompt.push_str(&format!("\nServings: {}\n", servings));
    }
    if let Some(minutes) = request.max_minutes {
        prompt.push_str(&format!("\nTotal time must not exceed {} minutes.\n", minutes));
    }

    vec![
        ChatMessage::system(RECIPE_SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ]
}

/// Shape checks for a recovered recipe object, then decoding.
pub fn validate_recipe(value: Value) -> Result<GeneratedRecipe, GenerationError> {
    require_object(&value, KIND)?;
    require_text(&value, KIND, &["title", "recipe_title", "name"])?;
    require_array(&value, KIND, &["ingredients"])?;
    require_array(&value, KIND, &["instructions", "steps"])?;

    let recipe: GeneratedRecipe = decode(value, KIND)?;
    if recipe.instructions.is_empty() {
        return Err(super::invalid(KIND, "instructions contain no text"));
    }
    Ok(recipe)
}

pub async fn generate_recipe(
    provider: &Provider,
    settings: &GenerationSettings,
    request: &RecipeRequest,
) -> Result<GeneratedRecipe, GenerationError> {
    let value = request_structured(provider, settings, build_recipe_messages(request)).await?;
    let recipe = validate_recipe(value)?;
    info!(
        "Generated recipe '{}' ({} ingredients, {} steps)",
        recipe.title,
        recipe.ingredients.len(),
        recipe.instructions.len()
    );
    Ok(recipe)
}
