//! API client for the risk prediction server

use anyhow::{Context, Result};
use clap::ValueEnum;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// Non-success reply from the server
#[derive(Debug, thiserror::Error)]
#[error("API error ({status}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;
        Self::parse(response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;
        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ApiError {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        response.json().await.context("Failed to parse response")
    }
}

// API request and response types

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RoadType {
    Urban,
    Rural,
    Highway,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Lighting {
    Daylight,
    Dim,
    Night,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    Clear,
    Rainy,
    Foggy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

/// Road and environment parameters of one prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub road_type: RoadType,
    pub num_lanes: u8,
    pub curvature: f64,
    pub speed_limit: u16,
    pub lighting: Lighting,
    pub weather: Weather,
    pub road_signs_present: bool,
    pub public_road: bool,
    pub time_of_day: TimeOfDay,
    pub holiday: bool,
    pub school_season: bool,
    pub num_reported_accidents: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub raw_score: f64,
    pub clamped_score: f64,
    pub risk_tier: String,
    pub family: String,
    pub model: String,
    pub session_id: String,
    pub strategy: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedModel {
    pub name: String,
    pub family: String,
    pub version: String,
    pub scaler: bool,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub default: Option<String>,
    pub loaded: Option<LoadedModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadRequest {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub training_records: i64,
    pub model_configs: i64,
    pub predictions: i64,
    pub available_models: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRow {
    pub model_name: String,
    pub dataset_type: String,
    pub mse: Option<f64>,
    pub r2_score: Option<f64>,
    pub mae: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub model_config_id: i64,
    pub input_features: String,
    pub predicted_risk: f64,
    pub risk_level: String,
    pub session_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureMetadata {
    pub feature_name: String,
    pub feature_type: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_parses_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/stats")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"training_records": 10, "model_configs": 2, "predictions": 5, "available_models": 3}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let stats: StatsResponse = client.get("api/v1/stats").await.unwrap();

        mock.assert_async().await;
        assert_eq!(stats.predictions, 5);
        assert_eq!(stats.available_models, 3);
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/predict")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "Configuration error: no model artifact is loaded"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .post::<PredictResponse, _>("api/v1/predict", &serde_json::json!({}))
            .await
            .unwrap_err();

        let api_error = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api_error.status, 503);
        assert_eq!(
            api_error.message,
            "Configuration error: no model artifact is loaded"
        );
    }

    #[test]
    fn test_predict_request_wire_shape() {
        let request = PredictRequest {
            road_type: RoadType::Highway,
            num_lanes: 4,
            curvature: 0.8,
            speed_limit: 100,
            lighting: Lighting::Night,
            weather: Weather::Foggy,
            road_signs_present: true,
            public_road: true,
            time_of_day: TimeOfDay::Evening,
            holiday: false,
            school_season: false,
            num_reported_accidents: 5,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["road_type"], "highway");
        assert_eq!(value["time_of_day"], "evening");
        assert_eq!(value["num_reported_accidents"], 5);
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
