//! Neighbor-pair partition consumed by the force passes.
//!
//! The neighbor search (external to this crate) delivers pairs already
//! split into one bucket per worker; a worker iterates only its own bucket,
//! so the bucket level needs no synchronization. Writes into shared
//! particles still go through each particle's own lock because the same
//! particle can appear in many buckets.

use crate::error::{Error, Result};

/// Ordered pair of particle indices.
pub type Pair = (usize, usize);

/// Ghost relation: `(source index, ghost index)`.
pub type GhostPair = (usize, usize);

/// Pair buckets for one step, rebuilt by the external neighbor search.
#[derive(Debug, Default)]
pub struct PairPartition {
    /// Free-free interactions between particles of the same material.
    pub same_material: Vec<Vec<Pair>>,
    /// Free-fixed interactions, free index first.
    pub free_fixed: Vec<Vec<Pair>>,
}

impl PairPartition {
    /// Empty partition with one bucket per worker.
    pub fn with_buckets(n: usize) -> Self {
        PairPartition {
            same_material: vec![Vec::new(); n],
            free_fixed: vec![Vec::new(); n],
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.same_material.len().max(self.free_fixed.len())
    }

    pub fn pair_count(&self) -> usize {
        self.same_material.iter().map(Vec::len).sum::<usize>()
            + self.free_fixed.iter().map(Vec::len).sum::<usize>()
    }

    /// Checks that every pair references two distinct live particles.
    pub fn validate(&self, particle_count: usize) -> Result<()> {
        for &(i, j) in self
            .same_material
            .iter()
            .chain(self.free_fixed.iter())
            .flatten()
        {
            if i == j || i >= particle_count || j >= particle_count {
                return Err(Error::InvalidPair {
                    i,
                    j,
                    count: particle_count,
                });
            }
        }
        Ok(())
    }

    /// Per-particle neighbor counts over both pair sets. Recomputed once per
    /// rebuild and cached on the particles.
    pub fn neighbor_counts(&self, particle_count: usize) -> Vec<usize> {
        let mut counts = vec![0usize; particle_count];
        for &(i, j) in self
            .same_material
            .iter()
            .chain(self.free_fixed.iter())
            .flatten()
        {
            counts[i] += 1;
            counts[j] += 1;
        }
        counts
    }
}
