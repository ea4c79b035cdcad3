use thiserror::Error;

/// A submission the service cannot work with.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Provide product name or image")]
    EmptySubmission,

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Image too large. Max size is {max} bytes")]
    ImageTooLarge { max: usize },

    #[error("{0}")]
    Malformed(String),
}

/// Everything that can go wrong between submitting a product and holding a
/// usable `AnalysisResult`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyzeError {
    #[error("invalid submission: {0}")]
    Validation(#[from] ValidationError),

    #[error("API request failed: {status} {status_text} - {body}")]
    RequestFailed {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("Failed to analyze product: {0}")]
    TransportFailed(String),

    #[error("Could not analyze this product: {reason}")]
    AnalysisNotFound { reason: String },
}

impl AnalyzeError {
    /// Whether showing a "Try Again" affordance with the same input makes sense.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalyzeError::TransportFailed(_) | AnalyzeError::RequestFailed { .. }
        )
    }
}

/// Value-range violations in a decoded `AnalysisResult`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("overall_score.percent must be within 0-100, got {0}")]
    PercentOutOfRange(f64),

    #[error("nutrition.per_100g.{field} must be a non-negative number, got {value}")]
    NegativeNutrient { field: &'static str, value: f64 },
}
