//! Bonet-Lok gradient renormalization matrices.
//!
//! Near boundaries and free surfaces the kernel-gradient sum loses
//! first-order consistency. The fix is a per-particle linear correction:
//! accumulate `-(m/ρ) · (∇W x_ij) ⊗ x_ij` over all neighbors and invert.
//! Rebuilt once per neighbor-search rebuild, not every step.

use glam::{DMat3, DVec3};
use rayon::prelude::*;

use crate::domain::{Dim, SimConfig};
use crate::kernel::grad_kernel;
use crate::pairs::PairPartition;
use crate::particle::ParticleStore;

/// Determinant magnitude below which the accumulated matrix is treated as
/// singular and replaced by the identity.
const DET_TOLERANCE: f64 = 1.0e-12;

fn outer(a: DVec3, b: DVec3) -> DMat3 {
    DMat3::from_cols(a * b.x, a * b.y, a * b.z)
}

/// Builds and inverts the correction matrix for every particle. Returns
/// the number of singular matrices replaced by the identity (diagnostic,
/// not an error).
pub fn build_correction_matrices(
    store: &mut ParticleStore,
    pairs: &PairPartition,
    cfg: &SimConfig,
) -> usize {
    store.as_mut_slice().par_iter_mut().for_each(|p| {
        p.accum.get_mut().grad_corr = DMat3::ZERO;
    });

    let particles = store.as_slice();
    pairs
        .same_material
        .par_iter()
        .chain(pairs.free_fixed.par_iter())
        .for_each(|bucket| {
            for &(i, j) in bucket {
                let pi = &particles[i];
                let pj = &particles[j];
                let xij = cfg.periodic_correction(pi.x - pj.x);
                let h = 0.5 * (pi.h + pj.h);
                let gk = grad_kernel(cfg.dim, cfg.kernel, xij.length() / h, h);
                if gk == 0.0 {
                    continue;
                }
                let term = outer(gk * xij, xij);
                {
                    let mut acc = pi.accum.lock();
                    acc.grad_corr = acc.grad_corr - (pj.mass / pj.density) * term;
                }
                {
                    let mut acc = pj.accum.lock();
                    acc.grad_corr = acc.grad_corr - (pi.mass / pi.density) * term;
                }
            }
        });

    let dim = cfg.dim;
    let singular: usize = store
        .as_mut_slice()
        .par_iter_mut()
        .map(|p| {
            if !p.is_free {
                p.grad_corr = DMat3::IDENTITY;
                return 0usize;
            }
            let mut m = p.accum.get_mut().grad_corr;
            if dim == Dim::Two {
                // The z row/column never receives contributions in 2D;
                // pin the diagonal so the determinant stays meaningful.
                m.z_axis = DVec3::Z;
            }
            if m.determinant().abs() > DET_TOLERANCE {
                p.grad_corr = m.inverse();
                0
            } else {
                p.grad_corr = DMat3::IDENTITY;
                1
            }
        })
        .sum();

    if singular > 0 {
        log::debug!("gradient correction: {singular} singular matrices replaced by identity");
    }
    singular
}
