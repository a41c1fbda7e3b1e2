//! Risk prediction command

use anyhow::Result;
use clap::Args;
use tabled::Tabled;

use crate::client::{ApiClient, Lighting, PredictRequest, PredictResponse, RoadType, TimeOfDay, Weather};
use crate::output::{
    advice, color_tier, format_score, print_json, print_warning, risk_bar, OutputFormat,
};

/// Road and environment parameters; defaults match a typical urban road
#[derive(Debug, Clone, Args)]
pub struct PredictArgs {
    #[arg(long, value_enum, default_value = "urban")]
    pub road_type: RoadType,

    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=8))]
    pub num_lanes: u8,

    /// Road curvature between 0.0 and 1.0 in steps of 0.1
    #[arg(long, default_value_t = 0.5, value_parser = parse_curvature)]
    pub curvature: f64,

    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u16).range(20..=120))]
    pub speed_limit: u16,

    #[arg(long, value_enum, default_value = "daylight")]
    pub lighting: Lighting,

    #[arg(long, value_enum, default_value = "clear")]
    pub weather: Weather,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub road_signs_present: bool,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub public_road: bool,

    #[arg(long, value_enum, default_value = "afternoon")]
    pub time_of_day: TimeOfDay,

    #[arg(long)]
    pub holiday: bool,

    #[arg(long)]
    pub school_season: bool,

    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub num_reported_accidents: u8,
}

impl From<PredictArgs> for PredictRequest {
    fn from(args: PredictArgs) -> Self {
        Self {
            road_type: args.road_type,
            num_lanes: args.num_lanes,
            curvature: args.curvature,
            speed_limit: args.speed_limit,
            lighting: args.lighting,
            weather: args.weather,
            road_signs_present: args.road_signs_present,
            public_road: args.public_road,
            time_of_day: args.time_of_day,
            holiday: args.holiday,
            school_season: args.school_season,
            num_reported_accidents: args.num_reported_accidents,
        }
    }
}

fn parse_curvature(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if !(0.0..=1.0).contains(&value) {
        return Err("curvature must be between 0.0 and 1.0".to_string());
    }
    let steps = value * 10.0;
    if (steps - steps.round()).abs() > 1e-9 {
        return Err("curvature must be a multiple of 0.1".to_string());
    }
    Ok(value)
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Risk Score")]
    score: String,
    #[tabled(rename = "Raw Output")]
    raw: String,
    #[tabled(rename = "Risk Tier")]
    tier: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Family")]
    family: String,
    #[tabled(rename = "Strategy")]
    strategy: String,
}

pub async fn predict(client: &ApiClient, args: PredictArgs, format: OutputFormat) -> Result<()> {
    let request = PredictRequest::from(args);
    let response: PredictResponse = client.post("api/v1/predict", &request).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            let row = ResultRow {
                score: format_score(response.clamped_score),
                raw: format_score(response.raw_score),
                tier: color_tier(&response.risk_tier),
                model: response.model.clone(),
                family: response.family.clone(),
                strategy: response.strategy.clone(),
            };
            let table = tabled::Table::new([row])
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\n{}", risk_bar(response.clamped_score));
            println!("{}", advice(&response.risk_tier));

            for warning in &response.warnings {
                print_warning(warning);
            }
            println!("\nSession: {}", response.session_id);
        }
    }

    Ok(())
}
