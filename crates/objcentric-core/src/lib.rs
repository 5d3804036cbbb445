//! Core of the objcentric inference service.
//!
//! An input image is decoded from base64, turned into an embedding by an [`Encoder`],
//! and matched against a bounded [`KernelPool`] of reference embeddings. The pool lives
//! on its own thread behind a [`PoolHost`] so that concurrent requests observe it one at
//! a time.
//!
//! The [`Predictor`] ties these pieces together and is what the HTTP layer talks to.

pub mod checkpoint;
pub mod decode;
pub mod encoder;
pub mod host;
pub mod pool;
pub mod predictor;
pub mod schemas;
pub mod settings;

pub use checkpoint::{Checkpoint, CheckpointError, KernelRecord};
pub use decode::{ImageError, decode_image};
pub use encoder::{ColorHistogramEncoder, EncodeError, Encoder, EncoderConfig};
pub use host::{PoolAccessor, PoolHost};
pub use pool::{Kernel, KernelMatch, KernelPool, Observation, PoolError};
pub use predictor::{PredictError, Predictor};
pub use schemas::{ErrorBody, HealthResponse, PredictRequest, PredictResponse};
pub use settings::{LogLevel, Settings, SettingsError};

pub type Result<T> = anyhow::Result<T>;
