//! Bounded pool of reference embeddings ("kernels").
//!
//! Queries that do not match any kernel well enough are admitted as new kernels. Once
//! the pool is full, admitting a kernel evicts the least recently used one.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Slack for f32 rounding when comparing a score against the match threshold.
pub const SCORE_TOLERANCE: f32 = 1e-6;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PoolError {
    #[error("Pool capacity must be at least 1")]
    ZeroCapacity,
    #[error("Embedding has dimension {actual}, pool expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Embedding has zero norm or contains non-finite values")]
    DegenerateEmbedding,
    #[error("Kernel {0} is already in the pool")]
    DuplicateId(Uuid),
    #[error("Pool host is no longer running")]
    HostStopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    pub id: Uuid,
    /// Unit L2 norm.
    pub embedding: Vec<f32>,
    pub hits: u64,
    pub last_used: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelMatch {
    pub id: Uuid,
    pub score: f32,
}

/// Outcome of matching one query against the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Best first, at most `k` entries.
    pub matches: Vec<KernelMatch>,
    /// Set when the query became a new kernel.
    pub admitted: Option<Uuid>,
    /// Set when admitting the query pushed an old kernel out.
    pub evicted: Option<Uuid>,
    pub num_kernels: usize,
}

#[derive(Debug, Clone)]
pub struct KernelPool {
    capacity: usize,
    dim: usize,
    kernels: Vec<Kernel>,
    clock: u64,
}

impl KernelPool {
    pub fn new(capacity: usize, dim: usize) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            dim,
            kernels: Vec::new(),
            clock: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Kernels in insertion order.
    pub fn kernels(&self) -> &[Kernel] {
        &self.kernels
    }

    pub fn get(&self, id: &Uuid) -> Option<&Kernel> {
        self.kernels.iter().find(|k| k.id == *id)
    }

    /// Add a kernel with a fresh id, evicting the least recently used one if full.
    ///
    /// Returns the new id and the evicted id, if any.
    pub fn insert(&mut self, embedding: Vec<f32>) -> Result<(Uuid, Option<Uuid>), PoolError> {
        let embedding = self.normalize(embedding)?;
        let id = Uuid::new_v4();
        let now = self.tick();
        let evicted = self.push(Kernel {
            id,
            embedding,
            hits: 0,
            last_used: now,
        });
        Ok((id, evicted))
    }

    /// Restore a previously persisted kernel, keeping its id and counters.
    pub fn restore(&mut self, kernel: Kernel) -> Result<Option<Uuid>, PoolError> {
        if self.get(&kernel.id).is_some() {
            return Err(PoolError::DuplicateId(kernel.id));
        }
        let embedding = self.normalize(kernel.embedding)?;
        self.clock = self.clock.max(kernel.last_used);
        Ok(self.push(Kernel {
            embedding,
            ..kernel
        }))
    }

    /// Score `query` against every kernel, best first, ties in insertion order.
    pub fn rank(&self, query: &[f32], k: usize) -> Result<Vec<KernelMatch>, PoolError> {
        let query = self.normalize(query.to_vec())?;
        Ok(self.rank_normalized(&query, k))
    }

    /// Match `query` and admit it as a new kernel when the best score is below `threshold`.
    pub fn observe(
        &mut self,
        query: Vec<f32>,
        threshold: f32,
        k: usize,
    ) -> Result<Observation, PoolError> {
        let query = self.normalize(query)?;
        let best = self.rank_normalized(&query, 1).into_iter().next();

        let mut admitted = None;
        let mut evicted = None;
        match best {
            Some(best) if best.score + SCORE_TOLERANCE >= threshold => {
                let now = self.tick();
                if let Some(kernel) = self.kernels.iter_mut().find(|k| k.id == best.id) {
                    kernel.hits += 1;
                    kernel.last_used = now;
                }
            }
            _ => {
                let id = Uuid::new_v4();
                let now = self.tick();
                evicted = self.push(Kernel {
                    id,
                    embedding: query.clone(),
                    hits: 1,
                    last_used: now,
                });
                admitted = Some(id);
            }
        }

        let mut matches = self.rank_normalized(&query, k);
        if let Some(id) = admitted {
            // The query is its own kernel, rounding aside.
            matches.retain(|m| m.id != id);
            matches.insert(0, KernelMatch { id, score: 1.0 });
            matches.truncate(k);
        }

        Ok(Observation {
            matches,
            admitted,
            evicted,
            num_kernels: self.kernels.len(),
        })
    }

    fn rank_normalized(&self, query: &[f32], k: usize) -> Vec<KernelMatch> {
        let mut scored: Vec<KernelMatch> = self
            .kernels
            .iter()
            .map(|kernel| KernelMatch {
                id: kernel.id,
                score: cosine(&kernel.embedding, query),
            })
            .collect();
        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }

    fn push(&mut self, kernel: Kernel) -> Option<Uuid> {
        let evicted = if self.kernels.len() >= self.capacity {
            self.evict_lru()
        } else {
            None
        };
        self.kernels.push(kernel);
        evicted
    }

    fn evict_lru(&mut self) -> Option<Uuid> {
        let (index, _) = self
            .kernels
            .iter()
            .enumerate()
            .min_by_key(|(_, kernel)| kernel.last_used)?;
        Some(self.kernels.remove(index).id)
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn normalize(&self, mut embedding: Vec<f32>) -> Result<Vec<f32>, PoolError> {
        if embedding.len() != self.dim {
            return Err(PoolError::DimensionMismatch {
                expected: self.dim,
                actual: embedding.len(),
            });
        }
        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if !norm.is_finite() || norm == 0.0 {
            return Err(PoolError::DegenerateEmbedding);
        }
        embedding.iter_mut().for_each(|v| *v /= norm);
        Ok(embedding)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| x * y)
        .sum::<f32>()
        .clamp(-1.0, 1.0)
}
