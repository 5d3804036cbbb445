use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::encoder::EncoderConfig;
use crate::pool::{Kernel, KernelPool, PoolError};

pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to read checkpoint `{path}`: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write checkpoint `{path}`: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Checkpoint `{path}` is corrupted: {source}")]
    Corrupted {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Unsupported checkpoint version {found} (expected {CHECKPOINT_VERSION})")]
    UnsupportedVersion { found: u32 },
    #[error("Kernel {id} cannot be restored: {source}")]
    InvalidKernel { id: Uuid, source: PoolError },
    #[error(transparent)]
    Pool(#[from] PoolError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KernelRecord {
    pub id: Uuid,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub hits: u64,
    #[serde(default)]
    pub last_used: u64,
}

impl From<&Kernel> for KernelRecord {
    fn from(kernel: &Kernel) -> Self {
        Self {
            id: kernel.id,
            embedding: kernel.embedding.clone(),
            hits: kernel.hits,
            last_used: kernel.last_used,
        }
    }
}

impl From<KernelRecord> for Kernel {
    fn from(record: KernelRecord) -> Self {
        Self {
            id: record.id,
            embedding: record.embedding,
            hits: record.hits,
            last_used: record.last_used,
        }
    }
}

/// Persisted encoder configuration and kernel pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub version: u32,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub kernels: Vec<KernelRecord>,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            encoder: EncoderConfig::default(),
            kernels: Vec::new(),
        }
    }
}

impl Checkpoint {
    /// Load the checkpoint at `path`, or `None` if no file exists there.
    pub fn load_optional(path: &Path) -> Result<Option<Self>, CheckpointError> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CheckpointError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let checkpoint: Checkpoint =
            serde_json::from_str(&contents).map_err(|source| CheckpointError::Corrupted {
                path: path.to_path_buf(),
                source,
            })?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: checkpoint.version,
            });
        }
        Ok(checkpoint)
    }

    /// Write the checkpoint, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let write_err = |source| CheckpointError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| {
            CheckpointError::Corrupted {
                path: path.to_path_buf(),
                source,
            }
        })?;
        std::fs::write(path, json).map_err(write_err)
    }

    pub fn from_pool(encoder: EncoderConfig, pool: &KernelPool) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            encoder,
            kernels: pool.kernels().iter().map(KernelRecord::from).collect(),
        }
    }

    /// Rebuild a pool of the given capacity and dimension from the stored kernels.
    ///
    /// When there are more kernels than `capacity`, the most recently used ones win.
    pub fn into_pool(self, capacity: usize, dim: usize) -> Result<KernelPool, CheckpointError> {
        let mut pool = KernelPool::new(capacity, dim)?;
        let mut records = self.kernels;
        if records.len() > capacity {
            log::warn!(
                "Checkpoint holds {} kernels but capacity is {}; keeping the most recently used",
                records.len(),
                capacity
            );
        }
        records.sort_by_key(|record| record.last_used);
        let skip = records.len().saturating_sub(capacity);
        for record in records.into_iter().skip(skip) {
            let id = record.id;
            pool.restore(record.into())
                .map_err(|source| CheckpointError::InvalidKernel { id, source })?;
        }
        Ok(pool)
    }
}
