use std::io::Cursor;

use candle_core::{DType, Device, Tensor};
use image::imageops::{self, FilterType};

use crate::error::PreprocessError;

/// Spatial input size of the classifier.
pub const INPUT_SIZE: usize = 224;

/// Per-channel statistics the pretrained checkpoint was trained with.
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decode uploaded bytes and normalize them into the `[1, 3, 224, 224]`
/// f32 tensor the classifier expects.
///
/// Every step is applied unconditionally: decode, RGB conversion
/// (grayscale replicated, alpha dropped), non-aspect-preserving Lanczos
/// resize to 224x224, scale to [0,1], per-channel mean/std normalization,
/// batch dimension.
pub fn normalize_image(bytes: &[u8], device: &Device) -> Result<Tensor, PreprocessError> {
    let decoded = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;

    let rgb = decoded.to_rgb8();
    let resized = imageops::resize(
        &rgb,
        INPUT_SIZE as u32,
        INPUT_SIZE as u32,
        FilterType::Lanczos3,
    );

    let pixels = resized.into_raw();
    let tensor = Tensor::from_vec(pixels, (INPUT_SIZE, INPUT_SIZE, 3), device)?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?;
    let scaled = (tensor / 255.0)?;

    let mean = Tensor::new(&IMAGENET_MEAN, device)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&IMAGENET_STD, device)?.reshape((3, 1, 1))?;
    let normalized = scaled.broadcast_sub(&mean)?.broadcast_div(&std)?;

    Ok(normalized.unsqueeze(0)?)
}
