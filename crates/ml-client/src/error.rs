use analysis_core::AnalysisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MLError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type MLResult<T> = Result<T, MLError>;

impl From<reqwest::Error> for MLError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MLError::Timeout(err.to_string())
        } else {
            MLError::RequestFailed(err)
        }
    }
}

impl From<MLError> for AnalysisError {
    fn from(err: MLError) -> Self {
        match err {
            MLError::ModelNotLoaded => AnalysisError::ModelUnavailable(err.to_string()),
            MLError::Timeout(_) => AnalysisError::Timeout(err.to_string()),
            MLError::InvalidResponse(_) | MLError::Serialization(_) => {
                AnalysisError::PredictionFailed(err.to_string())
            }
            MLError::RequestFailed(_) | MLError::ServiceUnavailable(_) => {
                AnalysisError::ApiError(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_loaded_maps_to_unavailable() {
        let err: AnalysisError = MLError::ModelNotLoaded.into();
        assert!(matches!(err, AnalysisError::ModelUnavailable(_)));
    }

    #[test]
    fn test_bad_payload_maps_to_prediction_failed() {
        let err: AnalysisError = MLError::InvalidResponse("NaN".to_string()).into();
        assert!(matches!(err, AnalysisError::PredictionFailed(_)));

        let err: AnalysisError = MLError::ServiceUnavailable("Status: 500".to_string()).into();
        assert!(matches!(err, AnalysisError::ApiError(_)));
    }
}
