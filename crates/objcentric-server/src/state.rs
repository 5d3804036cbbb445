use std::sync::Arc;

use anyhow::Result;
use objcentric_core::{HealthResponse, PredictError, Predictor, Settings};

/// Shared state managed by Rocket. Clones share the same predictor.
#[derive(Clone)]
pub struct AppState {
    predictor: Arc<Predictor>,
    settings: Arc<Settings>,
}

impl AppState {
    pub fn new(predictor: Predictor, settings: Settings) -> Self {
        Self {
            predictor: Arc::new(predictor),
            settings: Arc::new(settings),
        }
    }

    /// Load the kernel pool named by `settings` and wrap it.
    pub fn bootstrap(settings: Settings) -> Result<Self> {
        let predictor = Predictor::from_settings(&settings)?;
        Ok(Self::new(predictor, settings))
    }

    pub fn predictor(&self) -> Arc<Predictor> {
        Arc::clone(&self.predictor)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn health(&self) -> Result<HealthResponse, PredictError> {
        Ok(HealthResponse {
            status: "ok".to_string(),
            num_kernels: self.predictor.num_kernels()?,
            capacity: self.predictor.capacity()?,
            encoder: self.predictor.describe_encoder(),
            devices: self.settings.devices.clone(),
        })
    }

    /// Write the pool back to the checkpoint when `PERSIST_KERNELS` is on.
    /// Returns whether anything was written.
    pub fn persist_if_enabled(&self) -> Result<bool, PredictError> {
        if !self.settings.persist_kernels {
            return Ok(false);
        }
        self.predictor.persist(&self.settings.checkpoint_path)?;
        Ok(true)
    }
}
