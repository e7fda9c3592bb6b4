//! Standalone HTML documents for printing or sharing generated content.

use crate::generation::{GeneratedRecipe, ImageAnalysis, MealPlan, NutritionFacts};
use crate::rating::RatingDisplay;

const STYLE: &str = "
body { font-family: Georgia, 'Times New Roman', serif; color: #2d2a26; background: #fdfaf5; margin: 0; }
main { max-width: 780px; margin: 2rem auto; padding: 2rem 2.5rem; background: #fff; border: 1px solid #eadfcf; border-radius: 10px; }
h1 { color: #b5542d; margin-bottom: 0.25rem; }
h2 { border-bottom: 2px solid #f0e4d2; padding-bottom: 0.25rem; margin-top: 2rem; }
.description { font-style: italic; color: #6b6156; }
.meta { display: flex; flex-wrap: wrap; gap: 0.5rem 1.5rem; padding: 0; list-style: none; color: #6b6156; }
.meta strong { color: #2d2a26; }
.tags span { display: inline-block; background: #f7ecdc; border-radius: 999px; padding: 0.1rem 0.7rem; margin: 0 0.3rem 0.3rem 0; font-size: 0.85rem; }
.rating { font-size: 1.1rem; color: #b5542d; }
ol li, ul li { margin-bottom: 0.4rem; }
table { border-collapse: collapse; width: 100%; }
th, td { text-align: left; padding: 0.4rem 0.6rem; border-bottom: 1px solid #f0e4d2; }
.day { margin-bottom: 1.5rem; }
footer { margin-top: 2.5rem; font-size: 0.8rem; color: #9a8f82; text-align: center; }
@media print { body { background: #fff; } main { border: none; margin: 0; } }
";

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<main>\n{body}\
         <footer>Exported from RecipeHub</footer>\n</main>\n</body>\n</html>\n",
        title = escape_html(title),
    )
}

fn list(tag: &str, items: impl IntoIterator<Item = String>) -> String {
    let items: String = items
        .into_iter()
        .map(|item| format!("<li>{}</li>\n", escape_html(&item)))
        .collect();
    format!("<{tag}>\n{items}</{tag}>\n")
}

fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

fn nutrition_table(facts: &NutritionFacts) -> String {
    let rows = [
        ("Calories", Some(facts.calories), "kcal"),
        ("Protein", facts.protein_g, "g"),
        ("Carbohydrates", facts.carbohydrates_g, "g"),
        ("Fat", facts.fat_g, "g"),
        ("Fiber", facts.fiber_g, "g"),
        ("Sugar", facts.sugar_g, "g"),
        ("Sodium", facts.sodium_mg, "mg"),
    ];
    let body: String = rows
        .iter()
        .filter_map(|(label, value, unit)| {
            value.map(|v| format!("<tr><th>{}</th><td>{} {}</td></tr>\n", label, format_amount(v), unit))
        })
        .collect();
    format!("<table>\n{}</table>\n", body)
}

fn rating_line(rating: &RatingDisplay) -> String {
    if rating.has_ratings {
        format!("<p class=\"rating\">&#9733; {:.1} / 5</p>\n", rating.rating)
    } else {
        "<p class=\"rating\">No ratings yet</p>\n".to_string()
    }
}

pub fn recipe_to_html(recipe: &GeneratedRecipe, rating: Option<&RatingDisplay>) -> String {
    let mut body = format!("<h1>{}</h1>\n", escape_html(&recipe.title));
    if let Some(rating) = rating {
        body.push_str(&rating_line(rating));
    }
    if !recipe.description.is_empty() {
        body.push_str(&format!(
            "<p class=\"description\">{}</p>\n",
            escape_html(&recipe.description)
        ));
    }

    let meta: Vec<(&str, String)> = [
        ("Prep", recipe.prep_time.clone()),
        ("Cook", recipe.cook_time.clone()),
        ("Serves", recipe.servings.map(|s| s.to_string())),
        ("Difficulty", recipe.difficulty.clone()),
        ("Cuisine", recipe.cuisine.clone()),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|v| (label, v)))
    .collect();
    if !meta.is_empty() {
        body.push_str("<ul class=\"meta\">\n");
        for (label, value) in meta {
            body.push_str(&format!(
                "<li><strong>{}:</strong> {}</li>\n",
                label,
                escape_html(&value)
            ));
        }
        body.push_str("</ul>\n");
    }

    if !recipe.tags.is_empty() {
        let tags: String = recipe
            .tags
            .iter()
            .map(|tag| format!("<span>{}</span>", escape_html(tag)))
            .collect();
        body.push_str(&format!("<p class=\"tags\">{}</p>\n", tags));
    }

    body.push_str("<h2>Ingredients</h2>\n");
    body.push_str(&list("ul", recipe.ingredients.iter().map(|i| i.display_line())));
    body.push_str("<h2>Instructions</h2>\n");
    body.push_str(&list("ol", recipe.instructions.iter().cloned()));

    if let Some(nutrition) = &recipe.nutrition {
        body.push_str("<h2>Nutrition per serving</h2>\n");
        body.push_str(&nutrition_table(nutrition));
    }

    document(&recipe.title, &body)
}

pub fn meal_plan_to_html(plan: &MealPlan) -> String {
    let mut body = format!("<h1>{}</h1>\n", escape_html(&plan.title));

    for day in &plan.days {
        body.push_str("<section class=\"day\">\n");
        let heading = match day.total_calories() {
            Some(total) => format!("{} ({} kcal)", day.day, format_amount(total)),
            None => day.day.clone(),
        };
        body.push_str(&format!("<h2>{}</h2>\n", escape_html(&heading)));
        body.push_str("<table>\n");
        for meal in &day.meals {
            let calories = meal
                .calories
                .map(|c| format!("{} kcal", format_amount(c)))
                .unwrap_or_default();
            body.push_str(&format!(
                "<tr><th>{}</th><td><strong>{}</strong><br>{}</td><td>{}</td></tr>\n",
                escape_html(&meal.meal_type),
                escape_html(&meal.title),
                escape_html(&meal.description),
                calories
            ));
        }
        body.push_str("</table>\n</section>\n");
    }

    if !plan.shopping_list.is_empty() {
        body.push_str("<h2>Shopping list</h2>\n");
        body.push_str(&list("ul", plan.shopping_list.iter().cloned()));
    }
    if let Some(notes) = &plan.notes {
        body.push_str("<h2>Notes</h2>\n");
        body.push_str(&format!("<p>{}</p>\n", escape_html(notes)));
    }

    document(&plan.title, &body)
}

pub fn nutrition_to_html(title: &str, facts: &NutritionFacts) -> String {
    let mut body = format!("<h1>{}</h1>\n", escape_html(title));
    if let Some(servings) = facts.servings {
        body.push_str(&format!("<p class=\"description\">Makes {} serving(s)</p>\n", servings));
    }
    body.push_str("<h2>Nutrition per serving</h2>\n");
    body.push_str(&nutrition_table(facts));
    document(title, &body)
}

/// Full recipe page when the scan reconstructed one, otherwise a dish summary.
pub fn image_analysis_to_html(analysis: &ImageAnalysis) -> String {
    if let Some(recipe) = analysis.to_recipe() {
        return recipe_to_html(&recipe, None);
    }

    let mut body = format!("<h1>{}</h1>\n", escape_html(&analysis.dish_name));
    if !analysis.description.is_empty() {
        body.push_str(&format!(
            "<p class=\"description\">{}</p>\n",
            escape_html(&analysis.description)
        ));
    }
    if !analysis.ingredients.is_empty() {
        body.push_str("<h2>Likely ingredients</h2>\n");
        body.push_str(&list("ul", analysis.ingredients.iter().map(|i| i.display_line())));
    }
    if let Some(nutrition) = &analysis.estimated_nutrition {
        body.push_str("<h2>Estimated nutrition per serving</h2>\n");
        body.push_str(&nutrition_table(nutrition));
    }
    document(&analysis.dish_name, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::meal_plan::{MealPlanDay, PlannedMeal};
    use crate::generation::Ingredient;

    fn sample_recipe() -> GeneratedRecipe {
        GeneratedRecipe {
            title: "Mac & Cheese <Deluxe>".to_string(),
            description: "Kids' favourite".to_string(),
            ingredients: vec![Ingredient {
                name: "macaroni".to_string(),
                quantity: "200".to_string(),
                unit: "g".to_string(),
                notes: String::new(),
            }],
            instructions: vec!["Boil pasta.".to_string(), "Stir in \"cheese\".".to_string()],
            prep_time: Some("5 minutes".to_string()),
            cook_time: None,
            servings: Some(2),
            difficulty: None,
            cuisine: None,
            tags: vec!["Comfort".to_string()],
            nutrition: Some(NutritionFacts {
                calories: 540.0,
                protein_g: Some(21.5),
                carbohydrates_g: None,
                fat_g: None,
                fiber_g: None,
                sugar_g: None,
                sodium_mg: None,
                servings: None,
            }),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_recipe_to_html() {
        let rating = RatingDisplay {
            rating: 4.3,
            has_ratings: true,
        };
        let html = recipe_to_html(&sample_recipe(), Some(&rating));

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Mac &amp; Cheese &lt;Deluxe&gt;</title>"));
        assert!(html.contains("&#9733; 4.3 / 5"));
        assert!(html.contains("<li>200 g macaroni</li>"));
        assert!(html.contains("<li>Stir in &quot;cheese&quot;.</li>"));
        assert!(html.contains("<li><strong>Prep:</strong> 5 minutes</li>"));
        assert!(!html.contains("Cook:"));
        assert!(html.contains("<tr><th>Calories</th><td>540 kcal</td></tr>"));
        assert!(html.contains("<tr><th>Protein</th><td>21.5 g</td></tr>"));
        assert!(!html.contains("<Deluxe>"));
    }

    #[test]
    fn test_unrated_recipe() {
        let rating = RatingDisplay {
            rating: 0.0,
            has_ratings: false,
        };
        let html = recipe_to_html(&sample_recipe(), Some(&rating));
        assert!(html.contains("No ratings yet"));
    }

    #[test]
    fn test_meal_plan_to_html() {
        let plan = MealPlan {
            title: "Week 1".to_string(),
            days: vec![MealPlanDay {
                day: "Monday".to_string(),
                meals: vec![PlannedMeal {
                    meal_type: "Lunch".to_string(),
                    title: "Lentil <soup>".to_string(),
                    description: String::new(),
                    calories: Some(420.0),
                }],
            }],
            shopping_list: vec!["lentils".to_string()],
            notes: None,
        };
        let html = meal_plan_to_html(&plan);
        assert!(html.contains("<h2>Monday (420 kcal)</h2>"));
        assert!(html.contains("<strong>Lentil &lt;soup&gt;</strong>"));
        assert!(html.contains("<h2>Shopping list</h2>"));
        assert!(!html.contains("<h2>Notes</h2>"));
    }
}
