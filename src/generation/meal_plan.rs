use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient;
use super::{decode, invalid, request_structured, require_array, require_object, GenerationError};
use crate::api_connection::endpoints::{ChatMessage, Provider};
use crate::config::GenerationSettings;

const KIND: &str = "meal plan";
pub const MAX_PLAN_DAYS: u32 = 14;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedMeal {
    #[serde(default, alias = "type", alias = "meal", deserialize_with = "lenient::string")]
    pub meal_type: String,
    #[serde(alias = "name", alias = "recipe", alias = "recipe_title")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub calories: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlanDay {
    #[serde(default, alias = "name", deserialize_with = "lenient::string")]
    pub day: String,
    pub meals: Vec<PlannedMeal>,
}

impl MealPlanDay {
    pub fn total_calories(&self) -> Option<f64> {
        let known: Vec<f64> = self.meals.iter().filter_map(|meal| meal.calories).collect();
        (!known.is_empty()).then(|| known.iter().sum::<f64>())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlan {
    #[serde(default = "default_plan_title", deserialize_with = "lenient::string")]
    pub title: String,
    pub days: Vec<MealPlanDay>,
    #[serde(default, alias = "grocery_list", deserialize_with = "lenient::text_list")]
    pub shopping_list: Vec<String>,
    #[serde(default, alias = "tips", deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,
}

fn default_plan_title() -> String {
    "Meal Plan".to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct MealPlanRequest {
    pub days: u32,
    pub meals_per_day: u32,
    pub dietary: Vec<String>,
    pub calorie_target: Option<u32>,
    pub preferences: Option<String>,
}

impl Default for MealPlanRequest {
    fn default() -> Self {
        Self {
            days: 7,
            meals_per_day: 3,
            dietary: Vec::new(),
            calorie_target: None,
            preferences: None,
        }
    }
}

const MEAL_PLAN_SYSTEM_PROMPT: &str = "You are a meal-planning nutritionist.
Return exactly one JSON object and nothing else.
The object must have these properties:
- \"title\": string
- \"days\": array, one entry per day, each an object with \"day\" (e.g. \"Monday\") and \"meals\"
- each meal: object with \"meal_type\" (Breakfast, Lunch, Dinner or Snack), \"title\", \"description\" and numeric \"calories\"
- \"shopping_list\": array of strings covering every ingredient needed
- \"notes\": string with preparation tips";

pub fn build_meal_plan_messages(request: &MealPlanRequest) -> Vec<ChatMessage> {
    let mut prompt = format!(
        "Create a {}-day meal plan with {} meals per day.\n",
        request.days, request.meals_per_day
    );
    if !request.dietary.is_empty() {
        prompt.push_str(&format!("Dietary requirements: {}.\n", request.dietary.join(", ")));
    }
    if let Some(calories) = request.calorie_target {
        prompt.push_str(&format!("Aim for about {} calories per day.\n", calories));
    }
    if let Some(preferences) = &request.preferences {
        prompt.push_str(&format!("Preferences: {}\n", preferences.trim()));
    }
    vec![
        ChatMessage::system(MEAL_PLAN_SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ]
}

pub fn validate_meal_plan(value: Value) -> Result<MealPlan, GenerationError> {
    require_object(&value, KIND)?;
    let days = require_array(&value, KIND, &["days"])?;
    for (idx, day) in days.iter().enumerate() {
        match day.get("meals") {
            Some(Value::Array(_)) => {}
            _ => return Err(invalid(KIND, format!("day {} has no 'meals' array", idx + 1))),
        }
    }
    decode(value, KIND)
}

pub async fn generate_meal_plan(
    provider: &Provider,
    settings: &GenerationSettings,
    request: &MealPlanRequest,
) -> Result<MealPlan, GenerationError> {
    if request.days == 0 || request.days > MAX_PLAN_DAYS {
        return Err(invalid(
            KIND,
            format!("days must be between 1 and {}, got {}", MAX_PLAN_DAYS, request.days),
        ));
    }
    if request.meals_per_day == 0 {
        return Err(invalid(KIND, "meals_per_day must be at least 1"));
    }

    let value = request_structured(provider, settings, build_meal_plan_messages(request)).await?;
    let plan = validate_meal_plan(value)?;
    if plan.days.len() != request.days as usize {
        warn!(
            "Requested a {}-day plan but the model returned {} days",
            request.days,
            plan.days.len()
        );
    }
    info!("Generated meal plan '{}' ({} days)", plan.title, plan.days.len());
    Ok(plan)
}
