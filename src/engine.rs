use async_trait::async_trait;
use candle_core::{Device, Tensor};

use crate::error::InferenceError;
use crate::types::ScoredClass;

/// Number of top classes returned per classification.
pub const TOP_K: usize = 5;

/// A loaded classifier. Read-only at inference time, so one instance is
/// shared by all concurrent requests.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Run a forward pass over a normalized input batch and return the top
    /// classes by descending confidence, at most [`TOP_K`] of them.
    async fn classify(&self, input: &Tensor) -> Result<Vec<ScoredClass>, InferenceError>;

    /// Device input tensors must live on.
    fn device(&self) -> &Device;
}
