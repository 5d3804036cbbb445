use std::path::Path;

use anyhow::Context;
use image::DynamicImage;

use crate::checkpoint::{Checkpoint, CheckpointError};
use crate::decode::{ImageError, decode_image};
use crate::encoder::{EncodeError, Encoder, EncoderConfig};
use crate::host::PoolHost;
use crate::pool::{KernelPool, PoolError};
use crate::schemas::{PredictRequest, PredictResponse};
use crate::settings::Settings;

#[derive(thiserror::Error, Debug)]
pub enum PredictError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("Failed to encode image: {0}")]
    Encode(#[from] EncodeError),
    #[error("Kernel pool error: {0}")]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl PredictError {
    /// Whether the caller sent something unusable, as opposed to a service fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PredictError::Image(_) | PredictError::Encode(EncodeError::EmptyImage))
    }
}

/// Decodes, encodes and matches images against the hosted kernel pool.
pub struct Predictor {
    encoder: Box<dyn Encoder>,
    encoder_config: EncoderConfig,
    host: PoolHost,
    threshold: f32,
    top_k: usize,
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor")
            .field("encoder", &self.encoder.describe())
            .field("threshold", &self.threshold)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl Predictor {
    pub fn new(
        encoder_config: EncoderConfig,
        pool: KernelPool,
        threshold: f32,
        top_k: usize,
    ) -> Result<Self, PredictError> {
        let encoder = encoder_config.build()?;
        if encoder.dim() != pool.dim() {
            return Err(PoolError::DimensionMismatch {
                expected: encoder.dim(),
                actual: pool.dim(),
            }
            .into());
        }
        Ok(Self {
            encoder,
            encoder_config,
            host: PoolHost::spawn(pool),
            threshold,
            top_k,
        })
    }

    /// Build a predictor from the checkpoint named in `settings`.
    ///
    /// A missing checkpoint starts an empty pool with the default encoder.
    pub fn from_settings(settings: &Settings) -> crate::Result<Self> {
        let path = &settings.checkpoint_path;
        let checkpoint = match Checkpoint::load_optional(path)? {
            Some(checkpoint) => {
                log::info!(
                    "Loaded checkpoint {} ({} kernels)",
                    path.display(),
                    checkpoint.kernels.len()
                );
                checkpoint
            }
            None => {
                log::warn!(
                    "No checkpoint at {}, starting with an empty kernel pool",
                    path.display()
                );
                Checkpoint::default()
            }
        };

        let encoder_config = checkpoint.encoder;
        let dim = encoder_config
            .build()
            .context("Invalid encoder in checkpoint")?
            .dim();
        let pool = checkpoint
            .into_pool(settings.max_kernels, dim)
            .with_context(|| format!("Failed to restore kernels from {}", path.display()))?;

        Ok(Self::new(
            encoder_config,
            pool,
            settings.match_threshold,
            settings.top_k,
        )?)
    }

    pub fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, PredictError> {
        let image = decode_image(&request.image_base64)?;
        self.predict_image(&image)
    }

    pub fn predict_image(&self, image: &DynamicImage) -> Result<PredictResponse, PredictError> {
        let embedding = self.encoder.encode(image)?;
        let (threshold, top_k) = (self.threshold, self.top_k);
        let observation = self
            .host
            .with(move |pool| pool.observe(embedding, threshold, top_k))??;

        if let Some(id) = observation.admitted {
            log::debug!("Admitted kernel {id}");
        }
        if let Some(id) = observation.evicted {
            log::debug!("Evicted kernel {id}");
        }
        Ok(observation.into())
    }

    pub fn num_kernels(&self) -> Result<usize, PredictError> {
        Ok(self.host.with(|pool| pool.len())?)
    }

    pub fn capacity(&self) -> Result<usize, PredictError> {
        Ok(self.host.with(|pool| pool.capacity())?)
    }

    pub fn describe_encoder(&self) -> String {
        self.encoder.describe()
    }

    /// Snapshot of the encoder and current kernels.
    pub fn checkpoint(&self) -> Result<Checkpoint, PredictError> {
        let encoder = self.encoder_config;
        Ok(self
            .host
            .with(move |pool| Checkpoint::from_pool(encoder, pool))?)
    }

    pub fn persist(&self, path: &Path) -> Result<(), PredictError> {
        self.checkpoint()?.save(path)?;
        log::info!("Saved kernel pool to {}", path.display());
        Ok(())
    }
}
