//! Force accumulation engine.
//!
//! Three barrier-separated passes per step:
//! 1. reset transient accumulators and rebuild the tensile-instability
//!    tensor from the current stress state,
//! 2. smooth pressure/stress (and velocity for no-slip walls) from free
//!    particles onto their fixed neighbors, then normalize,
//! 3. evaluate the pairwise force model over every pair and fold the
//!    contributions into accelerations and density rates.
//!
//! Pair passes take `&[Particle]` and write only through each particle's
//! accumulator lock; per-particle passes take `&mut` and bypass the locks.

use glam::{DMat3, DVec3};
use rayon::prelude::*;

use crate::domain::{Dim, SimConfig};
use crate::kernel::{grad_kernel, kernel};
use crate::pairs::PairPartition;
use crate::particle::{reset_accum, Particle, ParticleStore};

/// Contributions of one pair evaluation. `accel_*` are accelerations, so
/// the third law reads `m_i · accel_i == -m_j · accel_j`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PairTerms {
    pub accel_i: DVec3,
    pub accel_j: DVec3,
    pub drho_i: f64,
    pub drho_j: f64,
}

/// Pairwise constitutive + viscous force law.
///
/// Implementations must be pure in the particles (read-only) and balanced:
/// the engine applies the returned terms under each particle's lock, one
/// lock at a time, so a model that peeks at accumulators would deadlock.
pub trait ForceModel: Send + Sync {
    /// `xij` is `x_i - x_j`, already periodic-corrected.
    fn eval(&self, pi: &Particle, pj: &Particle, xij: DVec3, cfg: &SimConfig) -> PairTerms;
}

/// Monaghan-style momentum and continuity contributions: full stress tensor
/// term plus artificial viscosity.
#[derive(Clone, Copy, Debug)]
pub struct MonaghanForce {
    /// Linear artificial-viscosity coefficient.
    pub alpha: f64,
    /// Quadratic artificial-viscosity coefficient.
    pub beta: f64,
}

impl Default for MonaghanForce {
    fn default() -> Self {
        MonaghanForce {
            alpha: 1.0,
            beta: 0.0,
        }
    }
}

impl ForceModel for MonaghanForce {
    fn eval(&self, pi: &Particle, pj: &Particle, xij: DVec3, cfg: &SimConfig) -> PairTerms {
        let h = 0.5 * (pi.h + pj.h);
        let r = xij.length();
        let gk = grad_kernel(cfg.dim, cfg.kernel, r / h, h);
        let gradw = gk * xij;

        // No-slip walls present a reflected velocity built from the
        // smoothed neighbor velocity.
        let vi = effective_velocity(pi);
        let vj = effective_velocity(pj);
        let vij = vi - vj;

        let visc = if vij.dot(xij) < 0.0 {
            let mu = h * vij.dot(xij) / (r * r + 0.01 * h * h);
            let cs = 0.5 * (pi.cs + pj.cs);
            let rho = 0.5 * (pi.density + pj.density);
            (-self.alpha * cs * mu + self.beta * mu * mu) / rho
        } else {
            0.0
        };

        let stress = pi.sigma * (1.0 / (pi.density * pi.density))
            + pj.sigma * (1.0 / (pj.density * pj.density))
            + pi.tir
            + pj.tir;

        let shared = stress * gradw - visc * gradw;
        let drho = vij.dot(gradw);

        PairTerms {
            accel_i: pj.mass * shared,
            accel_j: -pi.mass * shared,
            drho_i: pj.mass * drho,
            drho_j: pi.mass * drho,
        }
    }
}

fn effective_velocity(p: &Particle) -> DVec3 {
    if !p.is_free && p.no_slip {
        2.0 * p.v - p.nsv
    } else {
        p.v
    }
}

/// Pass 1: clear accumulators, seed accelerations, rebuild stabilization
/// tensors. Fixed particles get pressure and stress zeroed so the smoothing
/// pass starts from a clean slate.
pub fn reset_pass(store: &mut ParticleStore, cfg: &SimConfig) {
    let dim = cfg.dim;
    let axisym = cfg.axisymmetric;
    let gravity = cfg.gravity;
    store.as_mut_slice().par_iter_mut().for_each(|p| {
        reset_accum(p);
        if p.is_free {
            p.a = gravity;
            p.strain_rate = DMat3::ZERO;
            p.rotation_rate = DMat3::ZERO;
            p.tir = if p.ti > 0.0 {
                tensile_instability_tensor(p, dim, axisym)
            } else {
                DMat3::ZERO
            };
        } else {
            p.a = DVec3::ZERO;
            p.pressure = 0.0;
            p.sigma = DMat3::ZERO;
            p.nsv = DVec3::ZERO;
            p.tir = DMat3::ZERO;
        }
    });
}

/// Stabilization tensor from the stress eigenbasis: negative principal
/// stresses are dropped, positive ones scaled by `-TI / ρ_eff²`.
fn tensile_instability_tensor(p: &Particle, dim: Dim, axisymmetric: bool) -> DMat3 {
    let rho_eff = if axisymmetric {
        p.density * 2.0 * std::f64::consts::PI * p.x.x
    } else {
        p.density
    };
    // On the symmetry axis the effective density vanishes; no finite
    // correction exists there, so skip it.
    if rho_eff.abs() < 1.0e-12 {
        return DMat3::ZERO;
    }
    let scale = -p.ti / (rho_eff * rho_eff);

    match dim {
        Dim::Two => {
            let sxx = p.sigma.x_axis.x;
            let syy = p.sigma.y_axis.y;
            let sxy = p.sigma.y_axis.x;
            let theta = if (sxx - syy).abs() > f64::EPSILON {
                0.5 * (2.0 * sxy / (sxx - syy)).atan()
            } else {
                std::f64::consts::FRAC_PI_4
            };
            let (s, c) = theta.sin_cos();
            let p1 = c * c * sxx + 2.0 * c * s * sxy + s * s * syy;
            let p2 = s * s * sxx - 2.0 * c * s * sxy + c * c * syy;
            let r1 = if p1 > 0.0 { scale * p1 } else { 0.0 };
            let r2 = if p2 > 0.0 { scale * p2 } else { 0.0 };
            let txx = c * c * r1 + s * s * r2;
            let tyy = s * s * r1 + c * c * r2;
            let txy = s * c * (r1 - r2);
            DMat3::from_cols(
                DVec3::new(txx, txy, 0.0),
                DVec3::new(txy, tyy, 0.0),
                DVec3::ZERO,
            )
        }
        Dim::Three => {
            let (vals, vecs) = symmetric_eigen(p.sigma);
            let clipped = DVec3::new(
                if vals.x > 0.0 { scale * vals.x } else { 0.0 },
                if vals.y > 0.0 { scale * vals.y } else { 0.0 },
                if vals.z > 0.0 { scale * vals.z } else { 0.0 },
            );
            vecs * DMat3::from_diagonal(clipped) * vecs.transpose()
        }
    }
}

/// Eigen-decomposition of a symmetric 3x3 matrix by cyclic Jacobi rotation.
/// Returns eigenvalues and a matrix whose columns are the eigenvectors.
fn symmetric_eigen(m: DMat3) -> (DVec3, DMat3) {
    let mut a = [
        [m.x_axis.x, m.y_axis.x, m.z_axis.x],
        [m.x_axis.y, m.y_axis.y, m.z_axis.y],
        [m.x_axis.z, m.y_axis.z, m.z_axis.z],
    ];
    let mut v = [[0.0f64; 3]; 3];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for _ in 0..64 {
        let off = a[0][1] * a[0][1] + a[0][2] * a[0][2] + a[1][2] * a[1][2];
        if off < 1.0e-24 {
            break;
        }
        for p in 0..2 {
            for q in (p + 1)..3 {
                if a[p][q].abs() < 1.0e-30 {
                    continue;
                }
                let phi = 0.5 * (2.0 * a[p][q]).atan2(a[q][q] - a[p][p]);
                let (s, c) = phi.sin_cos();
                for k in 0..3 {
                    let akp = a[k][p];
                    let akq = a[k][q];
                    a[k][p] = c * akp - s * akq;
                    a[k][q] = s * akp + c * akq;
                }
                for k in 0..3 {
                    let apk = a[p][k];
                    let aqk = a[q][k];
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in v.iter_mut() {
                    let vp = row[p];
                    let vq = row[q];
                    row[p] = c * vp - s * vq;
                    row[q] = s * vp + c * vq;
                }
            }
        }
    }

    (
        DVec3::new(a[0][0], a[1][1], a[2][2]),
        DMat3::from_cols(
            DVec3::new(v[0][0], v[1][0], v[2][0]),
            DVec3::new(v[0][1], v[1][1], v[2][1]),
            DVec3::new(v[0][2], v[1][2], v[2][2]),
        ),
    )
}

/// Pass 2a: accumulate kernel-weighted pressure, stress, and (for no-slip
/// walls) velocity from the free side of every free-fixed pair into the
/// fixed side. Only the fixed particle's lock is taken; the free particle
/// is read-only here.
pub fn smooth_fixed_particles(store: &ParticleStore, pairs: &PairPartition, cfg: &SimConfig) {
    let particles = store.as_slice();
    pairs.free_fixed.par_iter().for_each(|bucket| {
        for &(a, b) in bucket {
            let (free, fixed) = if particles[a].is_free { (a, b) } else { (b, a) };
            let pf = &particles[free];
            let pw = &particles[fixed];
            if pw.rigid_contact {
                continue;
            }

            let xij = cfg.periodic_correction(pw.x - pf.x);
            let h = 0.5 * (pf.h + pw.h);
            let k = kernel(cfg.dim, cfg.kernel, xij.length() / h, h);
            if k == 0.0 {
                continue;
            }

            // Hydrostatic extrapolation: the gravity potential term raises
            // wall pressure below the fluid and lowers it above.
            let pres = pf.pressure * k + cfg.gravity.dot(xij) * pf.density * k;

            let mut acc = pw.accum.lock();
            acc.kernel_sum += k;
            acc.pressure_sum += pres;
            acc.sigma_sum = acc.sigma_sum + pf.sigma * k;
            if pw.no_slip {
                acc.nsv_sum += pf.v * k;
            }
        }
    });
}

/// Pass 2b: normalize the smoothed wall state by the kernel-weight total
/// and rebuild the wall-side stabilization tensor. Walls nobody touched
/// this step (zero kernel sum) are skipped.
pub fn finalize_fixed_particles(store: &mut ParticleStore, cfg: &SimConfig) {
    let dim = cfg.dim;
    let axisym = cfg.axisymmetric;
    store.as_mut_slice().par_iter_mut().for_each(|p| {
        if p.is_free || p.rigid_contact {
            return;
        }
        let acc = p.accum.get_mut();
        if acc.kernel_sum <= 0.0 {
            return;
        }
        let inv = 1.0 / acc.kernel_sum;
        p.pressure = acc.pressure_sum * inv;
        p.sigma = acc.sigma_sum * inv;
        if p.no_slip {
            p.nsv = acc.nsv_sum * inv;
        }
        if p.ti > 0.0 {
            p.tir = tensile_instability_tensor(p, dim, axisym);
        }
    });
}

/// Pass 3a: evaluate the force model over both pair sets, accumulating the
/// balanced contributions and the minimum neighbor distance (for the CFL
/// criterion) under each particle's lock, one lock at a time.
pub fn accumulate_pair_forces(
    store: &ParticleStore,
    pairs: &PairPartition,
    model: &dyn ForceModel,
    cfg: &SimConfig,
) {
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
                let dist = xij.length();
                let terms = model.eval(pi, pj, xij, cfg);

                {
                    let mut acc = pi.accum.lock();
                    acc.force += terms.accel_i;
                    acc.drho += terms.drho_i;
                    acc.min_dist = acc.min_dist.min(dist);
                }
                {
                    let mut acc = pj.accum.lock();
                    acc.force += terms.accel_j;
                    acc.drho += terms.drho_j;
                    acc.min_dist = acc.min_dist.min(dist);
                }
            }
        });
}

/// Pass 3b: fold accumulated pair contributions into each free particle's
/// acceleration and density rate.
pub fn apply_pair_forces(store: &mut ParticleStore) {
    store.as_mut_slice().par_iter_mut().for_each(|p| {
        let acc = p.accum.get_mut();
        if p.is_free {
            p.a += acc.force;
        }
        p.drho = acc.drho;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SimConfig;
    use approx::assert_relative_eq;

    fn test_cfg() -> SimConfig {
        SimConfig {
            dim: Dim::Two,
            gravity: DVec3::ZERO,
            ..SimConfig::default()
        }
    }

    fn particle(x: DVec3) -> Particle {
        let mut p = Particle::new(x, 1000.0, 1.0, 0.12);
        p.cs = 30.0;
        p.pressure = 10.0;
        p.sigma = DMat3::from_diagonal(DVec3::new(-10.0, -10.0, 0.0));
        p
    }

    #[test]
    fn monaghan_terms_balance_momentum() {
        let cfg = test_cfg();
        let pi = particle(DVec3::ZERO);
        let mut pj = particle(DVec3::new(0.1, 0.02, 0.0));
        pj.mass = 2.5;
        pj.v = DVec3::new(-0.3, 0.1, 0.0);
        let model = MonaghanForce::default();
        let terms = model.eval(&pi, &pj, pi.x - pj.x, &cfg);
        let net = pi.mass * terms.accel_i + pj.mass * terms.accel_j;
        assert_relative_eq!(net.length(), 0.0, epsilon = 1.0e-12);
    }

    #[test]
    fn reset_seeds_gravity_and_clears_walls() {
        let cfg = SimConfig {
            gravity: DVec3::new(0.0, -9.81, 0.0),
            ..test_cfg()
        };
        let mut store = ParticleStore::new();
        store.push(particle(DVec3::ZERO));
        let mut wall = particle(DVec3::X);
        wall.is_free = false;
        store.push(wall);

        reset_pass(&mut store, &cfg);
        assert_eq!(store[0].a, cfg.gravity);
        assert_eq!(store[1].a, DVec3::ZERO);
        assert_eq!(store[1].pressure, 0.0);
        assert_eq!(store[1].sigma, DMat3::ZERO);
    }

    #[test]
    fn compressive_stress_gives_zero_stabilization() {
        // Both principal stresses negative: the correction must vanish.
        let mut p = particle(DVec3::ZERO);
        p.ti = 0.3;
        p.sigma = DMat3::from_diagonal(DVec3::new(-5.0, -2.0, 0.0));
        let tir = tensile_instability_tensor(&p, Dim::Two, false);
        assert_relative_eq!(tir.x_axis.length(), 0.0, epsilon = 1.0e-15);
        assert_relative_eq!(tir.y_axis.length(), 0.0, epsilon = 1.0e-15);
    }

    #[test]
    fn tensile_stress_gives_negative_diagonal() {
        let mut p = particle(DVec3::ZERO);
        p.ti = 0.3;
        p.sigma = DMat3::from_diagonal(DVec3::new(5.0, 2.0, 0.0));
        let tir = tensile_instability_tensor(&p, Dim::Two, false);
        assert!(tir.x_axis.x < 0.0);
        assert!(tir.y_axis.y < 0.0);
    }

    #[test]
    fn on_axis_particle_skips_stabilization() {
        let mut p = particle(DVec3::new(0.0, 0.5, 0.0));
        p.ti = 0.3;
        p.sigma = DMat3::from_diagonal(DVec3::new(5.0, 2.0, 0.0));
        let tir = tensile_instability_tensor(&p, Dim::Two, true);
        assert!(tir.is_finite());
        assert_eq!(tir, DMat3::ZERO);
    }

    #[test]
    fn jacobi_recovers_diagonal_matrix() {
        let m = DMat3::from_diagonal(DVec3::new(3.0, -1.0, 2.0));
        let (vals, vecs) = symmetric_eigen(m);
        let rebuilt = vecs * DMat3::from_diagonal(vals) * vecs.transpose();
        for c in 0..3 {
            assert_relative_eq!(
                rebuilt.col(c).distance(m.col(c)),
                0.0,
                epsilon = 1.0e-10
            );
        }
    }

    #[test]
    fn jacobi_handles_off_diagonal() {
        let m = DMat3::from_cols(
            DVec3::new(2.0, 1.0, 0.0),
            DVec3::new(1.0, 2.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
        );
        let (vals, vecs) = symmetric_eigen(m);
        let rebuilt = vecs * DMat3::from_diagonal(vals) * vecs.transpose();
        for c in 0..3 {
            assert_relative_eq!(
                rebuilt.col(c).distance(m.col(c)),
                0.0,
                epsilon = 1.0e-10
            );
        }
        let mut sorted = [vals.x, vals.y, vals.z];
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_relative_eq!(sorted[0], 1.0, epsilon = 1.0e-10);
        assert_relative_eq!(sorted[2], 3.0, epsilon = 1.0e-10);
    }

    #[test]
    fn wall_smoothing_normalizes_by_kernel_sum() {
        let cfg = test_cfg();
        let mut store = ParticleStore::new();
        let mut fluid = particle(DVec3::ZERO);
        fluid.pressure = 40.0;
        store.push(fluid);
        let mut wall = particle(DVec3::new(0.05, 0.0, 0.0));
        wall.is_free = false;
        store.push(wall);

        let mut pairs = PairPartition::with_buckets(1);
        pairs.free_fixed[0].push((0, 1));

        reset_pass(&mut store, &cfg);
        smooth_fixed_particles(&store, &pairs, &cfg);
        finalize_fixed_particles(&mut store, &cfg);

        // Single neighbor, zero gravity: the wall takes the fluid pressure.
        assert_relative_eq!(store[1].pressure, 40.0, epsilon = 1.0e-12);
    }
}
