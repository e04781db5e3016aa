use std::sync::Arc;

use bytes::Bytes;

use crate::error::{InferenceError, PredictError};
use crate::preprocess;
use crate::registry::ModelRegistry;
use crate::types::{PredictResponse, Prediction};
use crate::validate;

/// The decoded upload handed over by the HTTP layer. Dropped as soon as
/// the normalized tensor exists.
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub filename: String,
    pub bytes: Bytes,
}

/// Orchestrates one classification request: validate, normalize, classify,
/// format. Each step is a hard gate; the first failure short-circuits the
/// rest and maps to exactly one [`PredictError`] variant.
pub struct PredictionPipeline {
    registry: Arc<ModelRegistry>,
}

impl PredictionPipeline {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    #[tracing::instrument(
        skip(self, upload),
        fields(filename = %upload.filename, size = upload.bytes.len())
    )]
    pub async fn handle(&self, upload: RawUpload) -> Result<PredictResponse, PredictError> {
        let RawUpload { filename, bytes } = upload;

        if !validate::is_supported_image(&filename) {
            return Err(PredictError::UnsupportedFileType { filename });
        }
        if bytes.is_empty() {
            return Err(PredictError::EmptyUpload { filename });
        }

        let classifier = self.registry.get_or_load().await?;

        // Decode and resize are CPU-heavy; keep them off the async executor.
        let device = classifier.device().clone();
        let tensor = tokio::task::spawn_blocking(move || {
            preprocess::normalize_image(&bytes, &device)
        })
        .await
        .map_err(|e| InferenceError::Task(e.to_string()))?
        .map_err(|source| PredictError::Decode {
            filename: filename.clone(),
            source,
        })?;

        let classes = classifier.classify(&tensor).await?;

        let predictions = classes
            .into_iter()
            .map(|class| Prediction {
                class_id: class.class_id,
                label: display_label(&class.label),
                confidence: class.confidence,
            })
            .collect();

        Ok(PredictResponse {
            filename,
            predictions,
        })
    }
}

/// Turn a raw taxonomy label into a display label: underscores become
/// spaces and each word is title-cased.
fn display_label(raw: &str) -> String {
    raw.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use async_trait::async_trait;
    use candle_core::{Device, Tensor};
    use image::{ImageFormat, Rgb, RgbImage};

    use crate::engine::Classifier;
    use crate::registry::SharedClassifier;
    use crate::types::ScoredClass;

    struct StubClassifier {
        device: Device,
        classes: Vec<ScoredClass>,
    }

    #[async_trait]
    impl Classifier for StubClassifier {
        async fn classify(&self, _input: &Tensor) -> Result<Vec<ScoredClass>, InferenceError> {
            Ok(self.classes.clone())
        }

        fn device(&self) -> &Device {
            &self.device
        }
    }

    fn pipeline_with(classes: Vec<ScoredClass>) -> PredictionPipeline {
        let registry = ModelRegistry::with_loader(Box::new(move || {
            let classes = classes.clone();
            Box::pin(async move {
                Ok(Arc::new(StubClassifier {
                    device: Device::Cpu,
                    classes,
                }) as SharedClassifier)
            })
        }));
        PredictionPipeline::new(Arc::new(registry))
    }

    fn scored(class_id: &str, label: &str, confidence: f32) -> ScoredClass {
        ScoredClass {
            class_id: class_id.to_string(),
            label: label.to_string(),
            confidence,
        }
    }

    fn png_upload(filename: &str) -> RawUpload {
        let image = RgbImage::from_pixel(48, 32, Rgb([200, 120, 40]));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        RawUpload {
            filename: filename.to_string(),
            bytes: Bytes::from(out.into_inner()),
        }
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected_before_decoding() {
        let pipeline = pipeline_with(Vec::new());
        // Junk bytes: if decoding were attempted this would be a decode error.
        let upload = RawUpload {
            filename: "notes.txt".to_string(),
            bytes: Bytes::from_static(b"not an image at all"),
        };

        let err = pipeline.handle(upload).await.unwrap_err();
        assert!(matches!(
            err,
            PredictError::UnsupportedFileType { ref filename } if filename == "notes.txt"
        ));
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let pipeline = pipeline_with(Vec::new());
        let upload = RawUpload {
            filename: "empty.jpg".to_string(),
            bytes: Bytes::new(),
        };

        let err = pipeline.handle(upload).await.unwrap_err();
        assert!(matches!(
            err,
            PredictError::EmptyUpload { ref filename } if filename == "empty.jpg"
        ));
    }

    #[tokio::test]
    async fn corrupt_bytes_with_valid_extension_fail_decoding() {
        let pipeline = pipeline_with(Vec::new());
        let upload = RawUpload {
            filename: "corrupt.png".to_string(),
            bytes: Bytes::from_static(b"\x00\x01\x02 random junk \xff\xfe"),
        };

        let err = pipeline.handle(upload).await.unwrap_err();
        assert!(matches!(
            err,
            PredictError::Decode { ref filename, .. } if filename == "corrupt.png"
        ));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn valid_upload_returns_formatted_predictions_in_order() {
        let pipeline = pipeline_with(vec![
            scored("n02123045", "tabby_cat", 0.83),
            scored("n02123159", "tiger_cat", 0.07),
            scored("n02124075", "Egyptian_cat", 0.04),
        ]);

        let response = pipeline.handle(png_upload("cat.png")).await.unwrap();

        assert_eq!(response.filename, "cat.png");
        assert_eq!(response.predictions.len(), 3);
        assert_eq!(response.predictions[0].class_id, "n02123045");
        assert_eq!(response.predictions[0].label, "Tabby Cat");
        assert_eq!(response.predictions[2].label, "Egyptian Cat");
        for pair in response.predictions.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        for prediction in &response.predictions {
            assert!((0.0..=1.0).contains(&prediction.confidence));
        }
    }

    #[tokio::test]
    async fn inference_failures_are_server_errors() {
        struct FailingClassifier {
            device: Device,
        }

        #[async_trait]
        impl Classifier for FailingClassifier {
            async fn classify(
                &self,
                _input: &Tensor,
            ) -> Result<Vec<ScoredClass>, InferenceError> {
                Err(InferenceError::Task("engine fault".to_string()))
            }

            fn device(&self) -> &Device {
                &self.device
            }
        }

        let registry = ModelRegistry::with_loader(Box::new(|| {
            Box::pin(async {
                Ok(Arc::new(FailingClassifier {
                    device: Device::Cpu,
                }) as SharedClassifier)
            })
        }));
        let pipeline = PredictionPipeline::new(Arc::new(registry));

        let err = pipeline.handle(png_upload("cat.png")).await.unwrap_err();
        assert!(matches!(err, PredictError::Inference(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn labels_are_title_cased_with_separators_replaced() {
        assert_eq!(display_label("tabby_cat"), "Tabby Cat");
        assert_eq!(display_label("great_white_shark"), "Great White Shark");
        assert_eq!(display_label("Egyptian_cat"), "Egyptian Cat");
        assert_eq!(display_label("goldfish"), "Goldfish");
        assert_eq!(display_label("GOLDEN_RETRIEVER"), "Golden Retriever");
    }
}
