use thiserror::Error;

/// Failure while turning uploaded bytes into model input.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("failed to read image container: {0}")]
    Io(#[from] std::io::Error),
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("tensor construction failed: {0}")]
    Tensor(#[from] candle_core::Error),
}

/// Model construction or forward-pass failure. Surfaced as a server error.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("failed to load classifier: {0}")]
    ModelLoad(anyhow::Error),
    #[error("forward pass failed: {0}")]
    Forward(#[from] candle_core::Error),
    #[error("inference task failed: {0}")]
    Task(String),
}

/// Per-request pipeline failure, one variant per gate.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error(
        "invalid file type: {filename:?}. Please upload a valid image file (JPG, PNG, etc.)"
    )]
    UnsupportedFileType { filename: String },
    #[error("empty file uploaded: {filename:?}")]
    EmptyUpload { filename: String },
    #[error("could not decode {filename:?} as an image: {source}")]
    Decode {
        filename: String,
        #[source]
        source: PreprocessError,
    },
    #[error("error processing image: {0}")]
    Inference(#[from] InferenceError),
}

impl PredictError {
    /// True when the failure is attributable to the client's upload.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFileType { .. } | Self::EmptyUpload { .. } | Self::Decode { .. }
        )
    }
}
