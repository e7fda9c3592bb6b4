use dotenv::dotenv;
use recipe_hub::api_connection::{
    ApiConnectionError, ChatCompletionRequest, ChatMessage, Provider,
};
use recipe_hub::config::{GenerationSettings, API_KEY_ENV_VAR};
use recipe_hub::generation::{
    calculate_nutrition, generate_meal_plan, generate_recipe, GenerationError, MealPlanRequest,
    NutritionRequest, RecipeRequest,
};
use std::env;

fn setup_test_environment() {
    dotenv().ok();
}

fn live_settings() -> Option<GenerationSettings> {
    setup_test_environment();
    if env::var(API_KEY_ENV_VAR).is_err() {
        println!("Skipping live test: {} not set.", API_KEY_ENV_VAR);
        return None;
    }
    Some(GenerationSettings {
        max_tokens: 2048,
        ..GenerationSettings::default()
    })
}

#[tokio::test]
async fn test_missing_api_key_error() {
    setup_test_environment();
    let settings = GenerationSettings {
        api_key_env_var: "THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ".to_string(),
        ..GenerationSettings::default()
    };
    let provider = Provider::openrouter(&settings);
    let request = ChatCompletionRequest {
        model: settings.model.clone(),
        messages: vec![ChatMessage::user("Hello")],
        response_format: None,
        temperature: None,
        max_tokens: None,
    };

    let result = provider.call_chat_completion(&request).await;
    match result {
        Err(ApiConnectionError::MissingApiKey(key_name)) => {
            assert_eq!(key_name, "THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ")
        }
        other => panic!("expected MissingApiKey, got {:?}", other),
    }
}

#[tokio::test]
async fn test_generation_surfaces_api_errors() {
    let settings = GenerationSettings {
        api_key_env_var: "THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ".to_string(),
        ..GenerationSettings::default()
    };
    let provider = Provider::openrouter(&settings);
    let err = generate_recipe(&provider, &settings, &RecipeRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Api(ApiConnectionError::MissingApiKey(_))
    ));
}

#[tokio::test]
#[ignore]
async fn test_live_recipe_generation() {
    let Some(settings) = live_settings() else {
        return;
    };
    let provider = Provider::openrouter(&settings);
    let request = RecipeRequest {
        prompt: "a simple tomato pasta".to_string(),
        servings: Some(2),
        ..Default::default()
    };

    let recipe = generate_recipe(&provider, &settings, &request)
        .await
        .unwrap_or_else(|e| panic!("recipe generation failed: {e}"));
    assert!(!recipe.title.is_empty());
    assert!(!recipe.ingredients.is_empty());
    assert!(!recipe.instructions.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_live_meal_plan_generation() {
    let Some(settings) = live_settings() else {
        return;
    };
    let provider = Provider::openrouter(&settings);
    let request = MealPlanRequest {
        days: 2,
        meals_per_day: 2,
        ..Default::default()
    };

    let plan = generate_meal_plan(&provider, &settings, &request)
        .await
        .unwrap_or_else(|e| panic!("meal plan generation failed: {e}"));
    assert!(!plan.days.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_live_nutrition_calculation() {
    let Some(settings) = live_settings() else {
        return;
    };
    let provider = Provider::openrouter(&settings);
    let request = NutritionRequest {
        ingredients: vec!["200 g cooked rice".to_string(), "1 tbsp olive oil".to_string()],
        servings: 1,
    };

    let facts = calculate_nutrition(&provider, &settings, &request)
        .await
        .unwrap_or_else(|e| panic!("nutrition calculation failed: {e}"));
    assert!(facts.calories > 100.0);
}

#[tokio::test]
#[ignore]
async fn test_api_error_with_invalid_key() {
    setup_test_environment();
    let env_var = "RECIPE_HUB_TEST_INVALID_KEY";
    env::set_var(env_var, "sk-invalid-key-for-testing");
    let settings = GenerationSettings {
        api_key_env_var: env_var.to_string(),
        ..GenerationSettings::default()
    };
    let provider = Provider::openrouter(&settings);
    let request = ChatCompletionRequest {
        model: settings.model.clone(),
        messages: vec![ChatMessage::user("Hello")],
        response_format: None,
        temperature: None,
        max_tokens: Some(10),
    };

    let result = provider.call_chat_completion(&request).await;
    env::remove_var(env_var);
    match result {
        Err(ApiConnectionError::ApiError { status, .. }) => {
            assert!(status.is_client_error(), "unexpected status {}", status)
        }
        other => panic!("expected ApiError, got {:?}", other),
    }
}
