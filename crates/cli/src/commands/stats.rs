//! Read-only views over the prediction log

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, FeatureMetadata, PerformanceRow, PredictionRecord, StatsResponse};
use crate::output::{
    color_tier, format_metric, format_score, format_timestamp, print_json, print_rows,
    OutputFormat,
};

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct PerformanceTableRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Dataset")]
    dataset: String,
    #[tabled(rename = "MSE")]
    mse: String,
    #[tabled(rename = "R²")]
    r2: String,
    #[tabled(rename = "MAE")]
    mae: String,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Time")]
    created_at: String,
    #[tabled(rename = "Risk")]
    risk: String,
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "Session")]
    session: String,
}

#[derive(Tabled)]
struct FeatureRow {
    #[tabled(rename = "Feature")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Description")]
    description: String,
}

pub async fn show_stats(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let stats: StatsResponse = client.get("api/v1/stats").await?;

    match format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Table => {
            let rows = vec![
                StatRow {
                    metric: "Training records",
                    value: stats.training_records.to_string(),
                },
                StatRow {
                    metric: "Model configs",
                    value: stats.model_configs.to_string(),
                },
                StatRow {
                    metric: "Predictions logged",
                    value: stats.predictions.to_string(),
                },
                StatRow {
                    metric: "Model artifacts",
                    value: stats.available_models.to_string(),
                },
            ];
            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}

pub async fn show_performance(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let rows: Vec<PerformanceRow> = client.get("api/v1/performance").await?;
    print_rows(
        &rows,
        |rows| {
            rows.iter()
                .map(|r| PerformanceTableRow {
                    model: r.model_name.clone(),
                    dataset: r.dataset_type.clone(),
                    mse: format_metric(r.mse),
                    r2: format_metric(r.r2_score),
                    mae: format_metric(r.mae),
                })
                .collect()
        },
        "No performance data for the active model",
        format,
    )
}

pub async fn show_history(client: &ApiClient, limit: usize, format: OutputFormat) -> Result<()> {
    let records: Vec<PredictionRecord> = client
        .get(&format!("api/v1/predictions?limit={}", limit))
        .await?;
    print_rows(
        &records,
        |records| {
            records
                .iter()
                .map(|r| HistoryRow {
                    id: r.id,
                    created_at: format_timestamp(&r.created_at),
                    risk: format_score(r.predicted_risk),
                    tier: color_tier(&r.risk_level),
                    session: r.session_id.clone(),
                })
                .collect()
        },
        "No predictions logged yet",
        format,
    )
}

pub async fn show_features(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let features: Vec<FeatureMetadata> = client.get("api/v1/features").await?;
    print_rows(
        &features,
        |features| {
            features
                .iter()
                .map(|f| FeatureRow {
                    name: f.feature_name.clone(),
                    kind: f.feature_type.clone(),
                    description: f.description.clone().unwrap_or_default(),
                })
                .collect()
        },
        "No feature metadata available",
        format,
    )
}
