use anyhow::{anyhow, Context, Result};
use log::info;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tokio::fs;

use crate::api_connection::Provider;
use crate::cli::{Command, GenerateCommand, OutputArgs, RatingsCommand};
use crate::config::{validate_prior, AppConfig};
use crate::export;
use crate::generation::image::{mime_type_for, MAX_IMAGE_BYTES};
use crate::generation::{
    analyze_food_image, calculate_nutrition, generate_meal_plan, generate_recipe,
    MealPlanRequest, NutritionRequest, RecipeRequest,
};
use crate::json_recovery::recover_structured;
use crate::rating::{
    audit_stats, load_rating_records, load_stored_stats, RatingAudit, RatingPrior, RatingRecord,
    RatingStore,
};

pub async fn execute(command: &Command, config: &AppConfig) -> Result<()> {
    match command {
        Command::Recover { file } => handle_recover(file).await,
        Command::Ratings(RatingsCommand::Rank {
            ratings,
            prior_weight,
            prior_mean,
            dataset_prior,
        }) => handle_rank(ratings, *prior_weight, *prior_mean, *dataset_prior, config).await,
        Command::Ratings(RatingsCommand::Audit { ratings, stats }) => {
            handle_audit(ratings, stats, config).await
        }
        Command::Generate(generate) => handle_generate(generate, config).await,
        Command::ScanImage { image, html } => handle_scan_image(image, html.as_deref(), config).await,
    }
}

async fn handle_recover(file: &Path) -> Result<()> {
    let raw = fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read model output from '{}'", file.display()))?;

    let value = recover_structured(&raw)
        .map_err(|e| anyhow!("Recovery failed at the {} stage: {}", e.stage(), e))?;
    print_json(&value)
}

async fn load_store(ratings: &Path) -> Result<(RatingStore, Vec<RatingRecord>)> {
    let records = load_rating_records(ratings)?;
    let store = RatingStore::new();
    store
        .import(&records)
        .await
        .with_context(|| format!("Failed to import ratings from '{}'", ratings.display()))?;
    info!("Imported {} rating records from {}", records.len(), ratings.display());
    Ok((store, records))
}

async fn handle_rank(
    ratings: &Path,
    prior_weight: Option<u32>,
    prior_mean: Option<f64>,
    dataset_prior: bool,
    config: &AppConfig,
) -> Result<()> {
    let (store, _) = load_store(ratings).await?;

    let weight = prior_weight.unwrap_or(config.rating_prior.prior_weight);
    let prior = if dataset_prior {
        store.dataset_prior(weight).await
    } else {
        RatingPrior::new(weight, prior_mean.unwrap_or(config.rating_prior.prior_mean))
    };
    validate_prior(&prior)?;

    println!(
        "Prior: weight {} mean {:.2}",
        prior.prior_weight, prior.prior_mean
    );
    println!(
        "{:<4} {:<24} {:>7} {:>8} {:>8} {:>7}",
        "#", "recipe", "ratings", "average", "weighted", "display"
    );
    for (rank, summary) in store.catalog(&prior).await.iter().enumerate() {
        let (average, display) = if summary.display.has_ratings {
            (
                format!("{:.2}", summary.simple_average),
                format!("{:.1}", summary.display.rating),
            )
        } else {
            ("-".to_string(), "-".to_string())
        };
        println!(
            "{:<4} {:<24} {:>7} {:>8} {:>8.3} {:>7}",
            rank + 1,
            summary.recipe_id,
            summary.stats.rating_count,
            average,
            summary.weighted_rating,
            display
        );
    }
    Ok(())
}

async fn handle_audit(ratings: &Path, stats: &Path, config: &AppConfig) -> Result<()> {
    let (store, records) = load_store(ratings).await?;
    let stored = load_stored_stats(stats)?;

    let recipe_ids: BTreeSet<&str> = records
        .iter()
        .map(|record| record.recipe_id.as_str())
        .chain(stored.keys().map(String::as_str))
        .collect();

    let mut audits: Vec<RatingAudit> = Vec::with_capacity(recipe_ids.len());
    for recipe_id in recipe_ids {
        // Recipes that only appear in the stats file have no ratings at all.
        let current = store.records(recipe_id).await.unwrap_or_default();
        let stored_stats = stored.get(recipe_id).copied().unwrap_or_default();
        audits.push(audit_stats(recipe_id, stored_stats, &current, &config.rating_prior));
    }

    for audit in &audits {
        let status = if audit.has_drift { "DRIFT" } else { "ok" };
        println!(
            "{:<6} {:<24} stored {}/{} recomputed {}/{} weighted {:.3} -> {:.3}",
            status,
            audit.recipe_id,
            audit.stored.rating_count,
            audit.stored.rating_sum,
            audit.recomputed.rating_count,
            audit.recomputed.rating_sum,
            audit.stored_weighted_rating,
            audit.recomputed_weighted_rating
        );
    }

    let drifted = audits.iter().filter(|audit| audit.has_drift).count();
    if drifted > 0 {
        return Err(anyhow!(
            "{} of {} recipes have drifted rating statistics",
            drifted,
            audits.len()
        ));
    }
    println!("All {} recipes consistent", audits.len());
    Ok(())
}

async fn handle_generate(command: &GenerateCommand, config: &AppConfig) -> Result<()> {
    let settings = &config.generation;
    let provider = Provider::openrouter(settings);

    match command {
        GenerateCommand::Recipe {
            prompt,
            ingredients,
            cuisine,
            dietary,
            servings,
            max_minutes,
            output,
        } => {
            let request = RecipeRequest {
                prompt: prompt.clone(),
                ingredients: ingredients.clone(),
                cuisine: cuisine.clone(),
                dietary: dietary.clone(),
                servings: *servings,
                max_minutes: *max_minutes,
            };
            let recipe = generate_recipe(&provider, settings, &request)
                .await
                .context("Recipe generation failed")?;
            print_json(&recipe)?;
            write_html(output, || export::recipe_to_html(&recipe, None)).await
        }
        GenerateCommand::MealPlan {
            days,
            meals_per_day,
            dietary,
            calories,
            preferences,
            output,
        } => {
            let request = MealPlanRequest {
                days: *days,
                meals_per_day: *meals_per_day,
                dietary: dietary.clone(),
                calorie_target: *calories,
                preferences: preferences.clone(),
            };
            let plan = generate_meal_plan(&provider, settings, &request)
                .await
                .context("Meal plan generation failed")?;
            print_json(&plan)?;
            write_html(output, || export::meal_plan_to_html(&plan)).await
        }
        GenerateCommand::Nutrition {
            ingredients,
            servings,
            output,
        } => {
            let request = NutritionRequest {
                ingredients: ingredients.clone(),
                servings: *servings,
            };
            let facts = calculate_nutrition(&provider, settings, &request)
                .await
                .context("Nutrition calculation failed")?;
            print_json(&facts)?;
            write_html(output, || export::nutrition_to_html("Nutrition Facts", &facts)).await
        }
    }
}

async fn handle_scan_image(image: &Path, html: Option<&Path>, config: &AppConfig) -> Result<()> {
    let metadata = fs::metadata(image)
        .await
        .with_context(|| format!("Image not found: {}", image.display()))?;
    if metadata.len() as usize > MAX_IMAGE_BYTES {
        return Err(anyhow!(
            "Image '{}' is {} bytes, the limit is {}",
            image.display(),
            metadata.len(),
            MAX_IMAGE_BYTES
        ));
    }
    let bytes = fs::read(image)
        .await
        .with_context(|| format!("Failed to read image '{}'", image.display()))?;

    let settings = &config.generation;
    let provider = Provider::openrouter(settings);
    let analysis = analyze_food_image(&provider, settings, &bytes, mime_type_for(image))
        .await
        .context("Image analysis failed")?;
    print_json(&analysis)?;

    let output = OutputArgs {
        html: html.map(Path::to_path_buf),
    };
    write_html(&output, || export::image_analysis_to_html(&analysis)).await
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON")?;
    println!("{}", rendered);
    Ok(())
}

async fn write_html(output: &OutputArgs, render: impl FnOnce() -> String) -> Result<()> {
    let Some(path) = &output.html else {
        return Ok(());
    };
    fs::write(path, render())
        .await
        .with_context(|| format!("Failed to write HTML to '{}'", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}
