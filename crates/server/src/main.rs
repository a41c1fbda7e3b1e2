//! Risk Server - accident risk prediction service

use anyhow::Result;
use risk_server::{api, build_state, config::ServerConfig};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = ServerConfig::load()?;
    info!(
        port = config.api_port,
        models_dir = %config.models_dir.display(),
        database = %config.database_path.display(),
        "Server configured"
    );

    let state = build_state(&config).await?;
    let model = state.session().await.map(|s| s.model_name().to_string());
    state.logger.log_startup(SERVER_VERSION, model.as_deref());

    let logger = state.logger.clone();
    let server = tokio::spawn(api::serve(config.api_port, state));

    tokio::select! {
        result = server => {
            result??;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
    }

    Ok(())
}
