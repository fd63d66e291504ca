//! Free-surface detection.
//!
//! Interior particles have symmetric neighborhoods, so their mass-weighted
//! relative-position sums cancel; surface particles keep a net vector
//! pointing away from the cloud. A particle is classified as surface when
//! that vector is long relative to its smoothing length and its
//! neighborhood is sparse.

use rayon::prelude::*;

use crate::domain::{Dim, SimConfig};
use crate::error::{Error, Result};
use crate::pairs::PairPartition;
use crate::particle::ParticleStore;

/// Surface-normal magnitude threshold as a fraction of `h`.
const NORMAL_THRESHOLD: f64 = 0.25;

/// Runs the detector over the same-material pairs, writing each particle's
/// `surface` flag. Returns the number of surface particles; zero is a
/// structural failure (a particle cloud always has an outer boundary).
pub fn detect_free_surface(
    store: &mut ParticleStore,
    pairs: &PairPartition,
    cfg: &SimConfig,
) -> Result<usize> {
    // Mean mass over the active range, excluding rigid-contact surface.
    let (mass_total, active) = store
        .iter()
        .filter(|p| !p.rigid_contact && !p.is_ghost())
        .fold((0.0, 0usize), |(m, n), p| (m + p.mass, n + 1));
    if active == 0 {
        return Err(Error::NoSurfaceDetected);
    }
    let mean_mass = mass_total / active as f64;

    // Clear previous normals, then accumulate the antisymmetric
    // mass-weighted position sums under each particle's lock.
    store.as_mut_slice().par_iter_mut().for_each(|p| {
        p.accum.get_mut().normal = glam::DVec3::ZERO;
    });

    let particles = store.as_slice();
    pairs.same_material.par_iter().for_each(|bucket| {
        for &(i, j) in bucket {
            let pi = &particles[i];
            let pj = &particles[j];
            let xij = cfg.periodic_correction(pi.x - pj.x);
            {
                let mut acc = pi.accum.lock();
                acc.normal += pj.mass * xij;
            }
            {
                let mut acc = pj.accum.lock();
                acc.normal -= pi.mass * xij;
            }
        }
    });

    let max_neighbors = cfg.dim.max_surface_neighbors();
    let inv_mean = 1.0 / mean_mass;
    let count = store
        .as_mut_slice()
        .par_iter_mut()
        .map(|p| {
            if p.is_ghost() || p.rigid_contact || p.skip_surface {
                return 0usize;
            }
            let normal = p.accum.get_mut().normal * inv_mean;
            p.surface =
                normal.length() >= NORMAL_THRESHOLD * p.h && p.nb_count <= max_neighbors;
            p.surface as usize
        })
        .sum();

    if count == 0 {
        return Err(Error::NoSurfaceDetected);
    }
    log::debug!("free-surface detection: {count} of {active} particles");
    Ok(count)
}

impl Dim {
    /// Neighbor-count ceiling for the surface classification.
    pub fn max_surface_neighbors(self) -> usize {
        match self {
            Dim::Two => 12,
            Dim::Three => 46,
        }
    }
}
