//! Accident Risk Predictor CLI
//!
//! Submits road and environment parameters for a risk prediction, manages
//! the loaded model and browses the prediction log.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{models, predict, stats};

/// Accident Risk Predictor CLI
#[derive(Parser)]
#[command(name = "arisk")]
#[command(author, version, about = "CLI for the Accident Risk Predictor", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via RISK_API_URL env var)
    #[arg(long, env = "RISK_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, value_enum)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict the accident risk of a road situation
    Predict(predict::PredictArgs),

    /// List or load model artifacts
    #[command(subcommand)]
    Models(ModelsCommands),

    /// Show record counts
    Stats,

    /// Show performance metrics of the active model
    Performance,

    /// Show recent predictions
    History {
        /// Number of predictions to show
        #[arg(long, short, default_value_t = 10)]
        limit: usize,
    },

    /// Show feature descriptions
    Features,
}

#[derive(Subcommand)]
pub enum ModelsCommands {
    /// List available model artifacts
    List,

    /// Load a model artifact on the server
    Load {
        /// Artifact file name as shown by `models list`
        filename: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    let client = client::ApiClient::new(&config.resolve_api_url(cli.api_url))?;
    let format = config.resolve_format(cli.format);

    match cli.command {
        Commands::Predict(args) => predict::predict(&client, args, format).await?,
        Commands::Models(models_cmd) => match models_cmd {
            ModelsCommands::List => models::list_models(&client, format).await?,
            ModelsCommands::Load { filename } => {
                models::load_model(&client, &filename, format).await?
            }
        },
        Commands::Stats => stats::show_stats(&client, format).await?,
        Commands::Performance => stats::show_performance(&client, format).await?,
        Commands::History { limit } => stats::show_history(&client, limit, format).await?,
        Commands::Features => stats::show_features(&client, format).await?,
    }

    Ok(())
}
