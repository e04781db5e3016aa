use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::OnceCell;

use crate::classifier::ImageClassifier;
use crate::config::ClassifierConfig;
use crate::engine::Classifier;
use crate::error::InferenceError;

pub type SharedClassifier = Arc<dyn Classifier>;

type ClassifierLoader =
    Box<dyn Fn() -> BoxFuture<'static, Result<SharedClassifier, InferenceError>> + Send + Sync>;

/// Process-wide owner of the single loaded classifier.
///
/// The cell guarantees that concurrent first access constructs exactly one
/// instance; every later call returns the same `Arc`. A failed load leaves
/// the cell empty, so a later request can attempt the load again; the
/// failed request itself is never retried.
pub struct ModelRegistry {
    cell: OnceCell<SharedClassifier>,
    loader: ClassifierLoader,
}

impl ModelRegistry {
    pub fn new(config: ClassifierConfig) -> Self {
        Self::with_loader(Box::new(move || {
            let config = config.clone();
            Box::pin(async move {
                let classifier = ImageClassifier::load(config)
                    .await
                    .map_err(InferenceError::ModelLoad)?;
                Ok(Arc::new(classifier) as SharedClassifier)
            })
        }))
    }

    pub(crate) fn with_loader(loader: ClassifierLoader) -> Self {
        Self {
            cell: OnceCell::new(),
            loader,
        }
    }

    /// Return the loaded classifier, constructing it on first call.
    pub async fn get_or_load(&self) -> Result<SharedClassifier, InferenceError> {
        let classifier = self.cell.get_or_try_init(|| (self.loader)()).await?;
        Ok(classifier.clone())
    }
}
