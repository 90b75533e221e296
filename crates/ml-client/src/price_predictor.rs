use analysis_core::{AnalysisError, FeatureVector, ValuationModel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::error::{MLError, MLResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairPricePrediction {
    pub predicted_price: f64,
    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct PredictionRequest<'a> {
    features: &'a FeatureVector,
}

/// Client for the fair-price regression service.
#[derive(Clone)]
pub struct PricePredictorClient {
    client: reqwest::Client,
    base_url: String,
}

impl PricePredictorClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            client: crate::http_client(timeout),
            base_url,
        }
    }

    /// Predict the fair price for one feature vector
    pub async fn predict_price(&self, features: &FeatureVector) -> MLResult<FairPricePrediction> {
        let response = self
            .client
            .post(format!("{}/valuation/predict", self.base_url))
            .json(&PredictionRequest { features })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                return Err(MLError::ModelNotLoaded);
            }
            return Err(MLError::ServiceUnavailable(format!("Status: {}", status)));
        }

        let body = response.text().await?;
        parse_prediction(&body)
    }

    /// Check service health
    pub async fn health(&self) -> MLResult<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        Ok(response.status().is_success())
    }
}

fn parse_prediction(body: &str) -> MLResult<FairPricePrediction> {
    let prediction: FairPricePrediction = serde_json::from_str(body)?;
    if !prediction.predicted_price.is_finite() {
        return Err(MLError::InvalidResponse(format!(
            "non-finite predicted price {}",
            prediction.predicted_price
        )));
    }
    Ok(prediction)
}

#[async_trait]
impl ValuationModel for PricePredictorClient {
    async fn predict(&self, features: &FeatureVector) -> Result<f64, AnalysisError> {
        let prediction = self.predict_price(features).await?;
        tracing::debug!(
            "Fair price {:.2} (model {})",
            prediction.predicted_price,
            prediction.model_version.as_deref().unwrap_or("unknown")
        );
        Ok(prediction.predicted_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prediction() {
        let parsed = parse_prediction(r#"{"predicted_price": 142.5, "model_version": "xgb-3"}"#).unwrap();
        assert_eq!(parsed.predicted_price, 142.5);
        assert_eq!(parsed.model_version.as_deref(), Some("xgb-3"));

        let parsed = parse_prediction(r#"{"predicted_price": 10}"#).unwrap();
        assert_eq!(parsed.predicted_price, 10.0);
        assert!(parsed.model_version.is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_prediction("{}"), Err(MLError::Serialization(_))));
        assert!(parse_prediction("not json").is_err());
    }

    #[test]
    fn test_request_uses_model_feature_names() {
        let features = FeatureVector {
            pe: 20.0,
            pb: 4.0,
            roe: 0.1,
            eps: 2.0,
            revenue_growth: 0.1,
            gross_margin: 0.5,
            market_cap: 1e9,
            free_cashflow: 1e7,
            sentiment: None,
        };
        let json = serde_json::to_value(PredictionRequest { features: &features }).unwrap();
        let map = json["features"].as_object().unwrap();
        assert_eq!(map["trailingPE"], 20.0);
        assert_eq!(map["grossMargins"], 0.5);
        assert!(!map.contains_key("sentiment"));
    }

    #[tokio::test]
    async fn test_unresponsive_service_times_out() {
        // Accepts connections but never answers
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let client = PricePredictorClient::new(url, Duration::from_millis(200));
        let features = FeatureVector {
            pe: 20.0,
            pb: 4.0,
            roe: 0.1,
            eps: 2.0,
            revenue_growth: 0.1,
            gross_margin: 0.5,
            market_cap: 1e9,
            free_cashflow: 1e7,
            sentiment: None,
        };

        let err = client.predict_price(&features).await.unwrap_err();
        assert!(matches!(err, MLError::Timeout(_)), "got {:?}", err);
        assert!(matches!(AnalysisError::from(err), AnalysisError::Timeout(_)));
        drop(listener);
    }

    #[tokio::test]
    #[ignore] // Requires the price predictor service at ML_PRICE_PREDICTOR_URL
    async fn test_predict_live() {
        let url = std::env::var("ML_PRICE_PREDICTOR_URL").unwrap();
        let client = PricePredictorClient::new(url, Duration::from_secs(5));
        assert!(client.health().await.unwrap());
    }
}
