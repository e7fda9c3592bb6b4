use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

use crate::rating::aggregator::{MAX_RATING, MIN_RATING};
use crate::rating::RatingPrior;

pub const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";
pub const DEFAULT_MODEL: &str = "qwen/qwen3-32b";
pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// Name of the environment variable holding the API key, not the key itself.
    pub api_key_env_var: String,
    pub model: String,
    pub api_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub site_url: String,
    pub app_name: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            api_key_env_var: API_KEY_ENV_VAR.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            site_url: "http://localhost:3000".to_string(),
            app_name: "RecipeHub".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppConfig {
    pub generation: GenerationSettings,
    pub rating_prior: RatingPrior,
}

impl AppConfig {
    /// Reads `.env` and the process environment, falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = GenerationSettings::default();
        let generation = GenerationSettings {
            api_key_env_var: lookup("RECIPE_HUB_API_KEY_VAR").unwrap_or(defaults.api_key_env_var),
            model: lookup("RECIPE_HUB_MODEL").unwrap_or(defaults.model),
            api_url: lookup("RECIPE_HUB_API_URL").unwrap_or(defaults.api_url),
            temperature: parse_var(&lookup, "RECIPE_HUB_TEMPERATURE", defaults.temperature)?,
            max_tokens: parse_var(&lookup, "RECIPE_HUB_MAX_TOKENS", defaults.max_tokens)?,
            site_url: lookup("SITE_URL").unwrap_or(defaults.site_url),
            app_name: lookup("APP_NAME").unwrap_or(defaults.app_name),
        };

        let default_prior = RatingPrior::default();
        let rating_prior = RatingPrior::new(
            parse_var(&lookup, "RATING_PRIOR_WEIGHT", default_prior.prior_weight)?,
            parse_var(&lookup, "RATING_PRIOR_MEAN", default_prior.prior_mean)?,
        );
        validate_prior(&rating_prior)?;

        Ok(Self {
            generation,
            rating_prior,
        })
    }
}

pub fn validate_prior(prior: &RatingPrior) -> Result<()> {
    if !(MIN_RATING as f64..=MAX_RATING as f64).contains(&prior.prior_mean) {
        return Err(anyhow::anyhow!(
            "Prior mean {} is outside the rating scale {}..={}",
            prior.prior_mean,
            MIN_RATING,
            MAX_RATING
        ));
    }
    Ok(())
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value '{}' for {}", raw, key)),
        None => Ok(default),
    }
}
