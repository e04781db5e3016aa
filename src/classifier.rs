use anyhow::{Result, bail};
use async_trait::async_trait;
use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::{DType, Device, Tensor};
use candle_nn::ops::softmax;
use candle_nn::{Func, Module, VarBuilder};
use candle_transformers::models::mobilenetv4;
use clap::ValueEnum;
use hf_hub::{Repo, RepoType, api::tokio::Api};
use tokio::sync::Mutex;

use crate::config::ClassifierConfig;
use crate::engine::{Classifier, TOP_K};
use crate::error::InferenceError;
use crate::labels::LabelTaxonomy;
use crate::types::ScoredClass;

/// MobileNetV4 variants with published ImageNet checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelVariant {
    Small,
    Medium,
    Large,
    HybridMedium,
    HybridLarge,
}

impl ModelVariant {
    fn config(&self) -> mobilenetv4::Config {
        match self {
            Self::Small => mobilenetv4::Config::small(),
            Self::Medium => mobilenetv4::Config::medium(),
            Self::Large => mobilenetv4::Config::large(),
            Self::HybridMedium => mobilenetv4::Config::hybrid_medium(),
            Self::HybridLarge => mobilenetv4::Config::hybrid_large(),
        }
    }
}

/// The pretrained image classifier. Loading is expensive and happens at
/// most once per process, through the registry.
pub struct ImageClassifier {
    model: Func<'static>,
    device: Device,
    labels: LabelTaxonomy,
    // The forward pass is read-only, but candle's graph execution is not
    // documented as reentrant; passes are serialized through this lock.
    infer_lock: Mutex<()>,
}

impl ImageClassifier {
    fn select_device(cpu: bool) -> Result<Device> {
        if cpu {
            Ok(Device::Cpu)
        } else if metal_is_available() {
            tracing::info!("Using metal acceleration");
            Ok(Device::new_metal(0)?)
        } else if cuda_is_available() {
            tracing::info!("Using CUDA GPU acceleration");
            Ok(Device::new_cuda(0)?)
        } else {
            tracing::info!(
                "CUDA not available, running on CPU. To run on GPU, build with `--features cuda`"
            );
            Ok(Device::Cpu)
        }
    }

    #[tracing::instrument(skip(config), fields(model_id = %config.model_id, cpu = config.cpu))]
    pub async fn load(config: ClassifierConfig) -> Result<Self> {
        let device = Self::select_device(config.cpu)?;

        // Get weights from either a local directory or the HuggingFace Hub.
        let (weights_filename, labels_filename) = match &config.model_path {
            Some(base_path) => {
                if !base_path.is_dir() {
                    bail!("Model path {} is not a directory.", base_path.display());
                }
                let weights_file = base_path.join("model.safetensors");
                let labels_file = config.labels_path.clone().or_else(|| {
                    let candidate = base_path.join("labels.txt");
                    candidate.is_file().then_some(candidate)
                });
                (weights_file, labels_file)
            }
            None => {
                let repo = Repo::with_revision(
                    config.model_id.clone(),
                    RepoType::Model,
                    config.revision.clone(),
                );
                let api = Api::new()?;
                let api = api.repo(repo);
                let weights_file = api.get("model.safetensors").await?;
                (weights_file, config.labels_path.clone())
            }
        };

        let labels = match labels_filename {
            Some(path) => {
                let labels = LabelTaxonomy::from_file(&path)?;
                if labels.len() != config.num_classes {
                    tracing::warn!(
                        labels = labels.len(),
                        num_classes = config.num_classes,
                        "Label count does not match the classifier head"
                    );
                }
                labels
            }
            None => {
                tracing::warn!("No labels file configured, using positional class names");
                LabelTaxonomy::positional(config.num_classes)
            }
        };

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_filename], DType::F32, &device)?
        };
        let model = mobilenetv4::mobilenetv4(&config.variant.config(), config.num_classes, vb)?;

        Ok(Self {
            model,
            device,
            labels,
            infer_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl Classifier for ImageClassifier {
    #[tracing::instrument(skip(self, input))]
    async fn classify(&self, input: &Tensor) -> Result<Vec<ScoredClass>, InferenceError> {
        let probs = {
            let _serialized = self.infer_lock.lock().await;
            let logits = self.model.forward(input)?;
            softmax(&logits, 1)?.squeeze(0)?.to_vec1::<f32>()?
        };

        let ranked = top_k(&probs, TOP_K)
            .into_iter()
            .map(|(index, confidence)| self.labels.scored(index, confidence))
            .collect();
        Ok(ranked)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

/// Indices of the k largest probabilities, descending. The sort is stable,
/// so ties keep the distribution's natural order.
fn top_k(probs: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = probs.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed.truncate(k);
    indexed
}
