//! Image to embedding encoders.
//!
//! The service only depends on the [`Encoder`] trait. The bundled
//! [`ColorHistogramEncoder`] is a deterministic, dependency free baseline: spatially
//! pooled colour histograms, L2-normalised so that a dot product is a cosine score.

use image::DynamicImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum EncodeError {
    #[error("image has no pixels")]
    EmptyImage,
    #[error("invalid encoder configuration: {0}")]
    InvalidConfig(String),
}

/// Turns an image into a fixed size embedding.
pub trait Encoder: Send + Sync + 'static {
    /// Length of every embedding this encoder produces.
    fn dim(&self) -> usize;

    fn encode(&self, image: &DynamicImage) -> Result<Vec<f32>, EncodeError>;

    /// Short human readable description, reported by the health endpoint.
    fn describe(&self) -> String;
}

/// Serializable encoder description, stored alongside the kernels in a checkpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncoderConfig {
    ColorHistogram { grid: u32, bins: u32, resize: u32 },
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig::ColorHistogram {
            grid: 2,
            bins: 8,
            resize: 64,
        }
    }
}

impl EncoderConfig {
    pub fn build(&self) -> Result<Box<dyn Encoder>, EncodeError> {
        match *self {
            EncoderConfig::ColorHistogram { grid, bins, resize } => Ok(Box::new(
                ColorHistogramEncoder::new(grid, bins, resize)?,
            )),
        }
    }
}

/// Largest accepted side length for the resized image.
pub const MAX_RESIZE: u32 = 4096;
/// Largest accepted embedding length.
pub const MAX_DIM: usize = 1 << 20;

#[derive(Debug, Clone)]
pub struct ColorHistogramEncoder {
    grid: u32,
    bins: u32,
    resize: u32,
    dim: usize,
}

impl ColorHistogramEncoder {
    pub fn new(grid: u32, bins: u32, resize: u32) -> Result<Self, EncodeError> {
        if grid == 0 || bins == 0 || resize == 0 {
            return Err(EncodeError::InvalidConfig(
                "grid, bins and resize must all be positive".into(),
            ));
        }
        if bins > 256 {
            return Err(EncodeError::InvalidConfig(format!(
                "at most 256 bins per channel, got {bins}"
            )));
        }
        if resize > MAX_RESIZE {
            return Err(EncodeError::InvalidConfig(format!(
                "resize must be at most {MAX_RESIZE}, got {resize}"
            )));
        }
        if resize < grid {
            return Err(EncodeError::InvalidConfig(format!(
                "resize ({resize}) must be at least the grid size ({grid})"
            )));
        }
        let dim = (grid as usize)
            .checked_mul(grid as usize)
            .and_then(|cells| cells.checked_mul(3 * bins as usize))
            .filter(|dim| *dim <= MAX_DIM)
            .ok_or_else(|| {
                EncodeError::InvalidConfig(format!(
                    "grid {grid} with {bins} bins exceeds {MAX_DIM} dimensions"
                ))
            })?;
        Ok(Self {
            grid,
            bins,
            resize,
            dim,
        })
    }

    pub fn config(&self) -> EncoderConfig {
        EncoderConfig::ColorHistogram {
            grid: self.grid,
            bins: self.bins,
            resize: self.resize,
        }
    }

    fn cell_of(&self, coord: u32) -> usize {
        let cell = u64::from(coord) * u64::from(self.grid) / u64::from(self.resize);
        cell.min(u64::from(self.grid - 1)) as usize
    }
}

impl Encoder for ColorHistogramEncoder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn encode(&self, image: &DynamicImage) -> Result<Vec<f32>, EncodeError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EncodeError::EmptyImage);
        }

        let rgb = image
            .resize_exact(self.resize, self.resize, FilterType::Triangle)
            .to_rgb8();

        let bins = self.bins as usize;
        let grid = self.grid as usize;
        let cell_len = 3 * bins;
        let mut features = vec![0f32; self.dim()];
        let mut counts = vec![0u32; grid * grid];

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let cell = self.cell_of(y) * grid + self.cell_of(x);
            counts[cell] += 1;
            let offset = cell * cell_len;
            for (channel, value) in pixel.0.iter().enumerate() {
                let bin = (*value as usize * bins) / 256;
                features[offset + channel * bins + bin] += 1.0;
            }
        }

        for (cell, count) in counts.iter().enumerate() {
            if *count == 0 {
                continue;
            }
            let offset = cell * cell_len;
            for value in &mut features[offset..offset + cell_len] {
                *value /= *count as f32;
            }
        }

        let norm = features.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            features.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(features)
    }

    fn describe(&self) -> String {
        format!(
            "color_histogram(grid={}, bins={}, resize={})",
            self.grid, self.bins, self.resize
        )
    }
}
