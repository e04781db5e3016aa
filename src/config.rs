use clap::Parser;
use std::path::PathBuf;

use crate::classifier::ModelVariant;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to bind to
    #[arg(long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Model ID on the Hugging Face Hub
    #[arg(
        long,
        env = "MODEL_ID",
        default_value = "timm/mobilenetv4_conv_small.e2400_r224_in1k"
    )]
    pub model_id: String,

    /// Local path to a model directory (takes precedence over --model-id)
    #[arg(long, env = "MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Model revision/branch on Hugging Face
    #[arg(long, env = "MODEL_REVISION", default_value = "main")]
    pub model_revision: String,

    /// MobileNetV4 variant matching the weights
    #[arg(long, env = "MODEL_VARIANT", value_enum, default_value = "small")]
    pub model_variant: ModelVariant,

    /// Number of classes in the classifier head
    #[arg(long, env = "NUM_CLASSES", default_value = "1000")]
    pub num_classes: usize,

    /// Labels file, one class per line: "<class_id> <label>" or "<label>"
    #[arg(long, env = "LABELS_PATH")]
    pub labels_path: Option<PathBuf>,

    /// Run on CPU instead of GPU
    #[arg(long, env = "CPU_ONLY")]
    pub cpu_only: bool,

    /// Directory holding the upload page and other static assets
    #[arg(long, env = "STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,
}

impl Config {
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The slice of the configuration the classifier needs to load itself.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub model_id: String,
    pub model_path: Option<PathBuf>,
    pub revision: String,
    pub variant: ModelVariant,
    pub num_classes: usize,
    pub labels_path: Option<PathBuf>,
    pub cpu: bool,
}

impl From<&Config> for ClassifierConfig {
    fn from(config: &Config) -> Self {
        Self {
            model_id: config.model_id.clone(),
            model_path: config.model_path.clone(),
            revision: config.model_revision.clone(),
            variant: config.model_variant,
            num_classes: config.num_classes,
            labels_path: config.labels_path.clone(),
            cpu: config.cpu_only,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_id: "timm/mobilenetv4_conv_small.e2400_r224_in1k".to_string(),
            model_path: None,
            revision: "main".to_string(),
            variant: ModelVariant::Small,
            num_classes: 1000,
            labels_path: None,
            cpu: false,
        }
    }
}
