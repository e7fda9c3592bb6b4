use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "RecipeHub ratings and AI generation tools")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Recover the JSON object from a saved model response
    Recover {
        /// File holding the raw model output
        file: PathBuf,
    },
    /// Rank recipes or audit stored rating statistics
    #[command(subcommand)]
    Ratings(RatingsCommand),
    /// Generate content with the configured model
    #[command(subcommand)]
    Generate(GenerateCommand),
    /// Identify a dish from a photo and reconstruct its recipe
    ScanImage {
        image: PathBuf,
        #[arg(long)]
        html: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum RatingsCommand {
    /// Print recipes ordered by weighted rating
    Rank {
        /// CSV with recipe_id,user_id,rating[,updated_at]
        #[arg(long)]
        ratings: PathBuf,
        #[arg(long)]
        prior_weight: Option<u32>,
        #[arg(long)]
        prior_mean: Option<f64>,
        /// Use the mean of all ratings in the file as the prior mean
        #[arg(long, conflicts_with = "prior_mean")]
        dataset_prior: bool,
    },
    /// Compare stored counters against the individual ratings
    Audit {
        #[arg(long)]
        ratings: PathBuf,
        /// CSV with recipe_id,rating_count,rating_sum
        #[arg(long)]
        stats: PathBuf,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum GenerateCommand {
    Recipe {
        /// What to cook, in your own words
        #[arg(default_value = "")]
        prompt: String,
        /// Available ingredient (repeatable)
        #[arg(short, long = "ingredient")]
        ingredients: Vec<String>,
        #[arg(long)]
        cuisine: Option<String>,
        /// Dietary requirement (repeatable)
        #[arg(short, long = "dietary")]
        dietary: Vec<String>,
        #[arg(long)]
        servings: Option<u32>,
        #[arg(long)]
        max_minutes: Option<u32>,
        #[command(flatten)]
        output: OutputArgs,
    },
    MealPlan {
        #[arg(long, default_value_t = 7)]
        days: u32,
        #[arg(long, default_value_t = 3)]
        meals_per_day: u32,
        #[arg(short, long = "dietary")]
        dietary: Vec<String>,
        #[arg(long)]
        calories: Option<u32>,
        #[arg(long)]
        preferences: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    Nutrition {
        /// Ingredient lines, e.g. "200 g rice"
        #[arg(required = true)]
        ingredients: Vec<String>,
        #[arg(long, default_value_t = 1)]
        servings: u32,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct OutputArgs {
    /// Also write a standalone HTML page to this path
    #[arg(long)]
    pub html: Option<PathBuf>,
}

pub fn parse_args() -> Command {
    Cli::parse().command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ratings_rank() {
        let cli = Cli::try_parse_from([
            "recipe-hub",
            "ratings",
            "rank",
            "--ratings",
            "ratings.csv",
            "--prior-weight",
            "10",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Command::Ratings(RatingsCommand::Rank {
                ratings: PathBuf::from("ratings.csv"),
                prior_weight: Some(10),
                prior_mean: None,
                dataset_prior: false,
            })
        );
    }

    #[test]
    fn test_dataset_prior_conflicts_with_mean() {
        let result = Cli::try_parse_from([
            "recipe-hub",
            "ratings",
            "rank",
            "--ratings",
            "r.csv",
            "--prior-mean",
            "3.5",
            "--dataset-prior",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_generate_recipe() {
        let cli = Cli::try_parse_from([
            "recipe-hub",
            "generate",
            "recipe",
            "spicy noodles",
            "-i",
            "noodles",
            "-i",
            "chili",
            "--html",
            "out.html",
        ])
        .unwrap();
        let Command::Generate(GenerateCommand::Recipe {
            prompt,
            ingredients,
            output,
            ..
        }) = cli.command
        else {
            panic!("expected generate recipe");
        };
        assert_eq!(prompt, "spicy noodles");
        assert_eq!(ingredients, vec!["noodles", "chili"]);
        assert_eq!(output.html, Some(PathBuf::from("out.html")));
    }

    #[test]
    fn test_nutrition_requires_ingredients() {
        assert!(Cli::try_parse_from(["recipe-hub", "generate", "nutrition"]).is_err());
    }
}
