use serde::Serialize;

/// A taxonomy class together with the confidence the model assigned to it.
/// Produced by the classifier in descending-confidence order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredClass {
    pub class_id: String,
    pub label: String,
    pub confidence: f32,
}

/// One prediction in the response body, with the label already formatted
/// for display.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub class_id: String,
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub filename: String,
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}
