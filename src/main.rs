use anyhow::Result;

use recipe_hub::cli::parse_args;
use recipe_hub::commands::execute;
use recipe_hub::config::AppConfig;

#[tokio::main]
async fn main() {
    setup_logging();
    parse_and_execute().await.unwrap_or_else(|e| {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    });
}

fn setup_logging() {
    sensible_env_logger::init!();
}

async fn parse_and_execute() -> Result<()> {
    let command = parse_args();
    let config = AppConfig::from_env()?;
    execute(&command, &config).await
}
