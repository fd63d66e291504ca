//! Particle record and arena store.
//!
//! Identity is a stable index into [`ParticleStore`]; records never move
//! during a step. The mutable per-step accumulator block lives behind a
//! per-particle mutex so pair passes from different worker buckets can
//! write into the same particle without a global lock. Plain state fields
//! are written only in barrier-separated per-particle passes, which hold
//! `&mut` and bypass the mutex via `get_mut`.

use glam::{DMat3, DVec3};
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// How a ghost particle reconstructs kinematics from its mirror source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GhostKind {
    /// Axis-aligned reflection: negate the velocity/acceleration component
    /// along the given axis (0 = x, 1 = y, 2 = z), copy the rest.
    MirrorAxis(usize),
    /// Oblique reflection across the registered plane with the given index:
    /// keep tangential components, zero out the normal one.
    Symmetric(usize),
}

/// Transient per-step totals, guarded by the particle's mutex.
///
/// Everything here is accumulated commutatively by the pair passes and
/// consumed (then reset) by the per-particle barrier passes.
#[derive(Debug)]
pub struct Accumulator {
    /// Pairwise force contributions, folded into `a` at the end of the
    /// force pass.
    pub force: DVec3,
    /// Density rate dρ/dt from the continuity contributions.
    pub drho: f64,
    /// Kernel-weight total for fixed-particle smoothing.
    pub kernel_sum: f64,
    /// Kernel-weighted pressure total (fixed-particle smoothing).
    pub pressure_sum: f64,
    /// Kernel-weighted stress total (fixed-particle smoothing).
    pub sigma_sum: DMat3,
    /// Kernel-weighted velocity total for no-slip walls.
    pub nsv_sum: DVec3,
    /// Mass-weighted relative-position total for surface detection.
    pub normal: DVec3,
    /// Renormalization-matrix total (negative dyadic sum).
    pub grad_corr: DMat3,
    /// Minimum center distance to any neighbor, for the CFL criterion.
    pub min_dist: f64,
}

impl Accumulator {
    // glam's matrix Default is the identity, which is the wrong zero
    // element for these sums, so initialization is spelled out.
    fn new() -> Self {
        Accumulator {
            force: DVec3::ZERO,
            drho: 0.0,
            kernel_sum: 0.0,
            pressure_sum: 0.0,
            sigma_sum: DMat3::ZERO,
            nsv_sum: DVec3::ZERO,
            normal: DVec3::ZERO,
            grad_corr: DMat3::ZERO,
            min_dist: f64::INFINITY,
        }
    }
}

/// One SPH particle. In 2D runs the z components are carried but stay zero.
#[derive(Debug)]
pub struct Particle {
    pub x: DVec3,
    pub v: DVec3,
    pub a: DVec3,

    pub density: f64,
    pub ref_density: f64,
    pub mass: f64,
    /// Smoothing length, adapted within `[h_min, h_max]`.
    pub h: f64,
    pub h_min: f64,
    pub h_max: f64,
    pub pressure: f64,
    /// Density rate from the latest force pass.
    pub drho: f64,
    /// Reference pressure fed to the equation of state.
    pub ref_pressure: f64,
    /// Speed of sound in this particle's material.
    pub cs: f64,

    /// Cauchy stress.
    pub sigma: DMat3,
    pub shear_stress: DMat3,
    pub strain: DMat3,
    pub strain_rate: DMat3,
    pub rotation_rate: DMat3,
    /// Accumulated equivalent plastic strain.
    pub pl_strain: f64,

    /// Tensile-instability coefficient; 0 disables the correction.
    pub ti: f64,
    /// Stabilization tensor rebuilt each step from the stress eigenbasis.
    pub tir: DMat3,

    /// Free particles move under the momentum equation; fixed ones are
    /// boundary material whose state is smoothed from their free neighbors.
    pub is_free: bool,
    /// Fixed particle enforcing a no-slip wall (velocity smoothed too).
    pub no_slip: bool,
    /// Smoothed neighbor velocity on no-slip walls, rebuilt each step.
    pub nsv: DVec3,
    /// Classified as rigid-contact surface; excluded from wall smoothing.
    pub rigid_contact: bool,
    pub tag: i32,
    /// Neighbor count from the latest pair rebuild.
    pub nb_count: usize,
    /// On the free surface per the latest detector run.
    pub surface: bool,
    /// Never classify as surface (e.g. interior seed particles).
    pub skip_surface: bool,
    /// Bonet-Lok correction matrix from the latest rebuild.
    pub grad_corr: DMat3,

    /// Non-ghost boundary particle whose kinematics get the symmetry
    /// correction applied in place (plane index when set).
    pub correct_plane: Option<usize>,
    /// Set on ghost particles; real particles carry `None`.
    pub ghost: Option<GhostKind>,

    pub accum: Mutex<Accumulator>,
}

impl Particle {
    /// A free particle with unit material defaults; callers override fields
    /// as needed.
    pub fn new(x: DVec3, density: f64, mass: f64, h: f64) -> Self {
        Particle {
            x,
            v: DVec3::ZERO,
            a: DVec3::ZERO,
            density,
            ref_density: density,
            mass,
            h,
            h_min: h,
            h_max: h,
            pressure: 0.0,
            drho: 0.0,
            ref_pressure: 0.0,
            cs: 0.0,
            sigma: DMat3::ZERO,
            shear_stress: DMat3::ZERO,
            strain: DMat3::ZERO,
            strain_rate: DMat3::ZERO,
            rotation_rate: DMat3::ZERO,
            pl_strain: 0.0,
            ti: 0.0,
            tir: DMat3::ZERO,
            is_free: true,
            no_slip: false,
            nsv: DVec3::ZERO,
            rigid_contact: false,
            tag: 0,
            nb_count: 0,
            surface: false,
            skip_surface: false,
            grad_corr: DMat3::IDENTITY,
            correct_plane: None,
            ghost: None,
            accum: Mutex::new(Accumulator::new()),
        }
    }

    pub fn is_ghost(&self) -> bool {
        self.ghost.is_some()
    }
}

/// Arena of particles addressed by stable index.
///
/// Indices stay valid for the whole step; `delete_by_tag` compacts them and
/// is only safe between steps, after which pair lists must be rebuilt.
#[derive(Debug, Default)]
pub struct ParticleStore {
    items: Vec<Particle>,
}

impl ParticleStore {
    pub fn new() -> Self {
        ParticleStore { items: Vec::new() }
    }

    /// Appends a particle and returns its index.
    pub fn push(&mut self, p: Particle) -> usize {
        self.items.push(p);
        self.items.len() - 1
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Particle> {
        self.items.get(i)
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut Particle> {
        self.items.get_mut(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Particle> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[Particle] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [Particle] {
        &mut self.items
    }

    /// Removes every particle carrying `tag`, compacting indices.
    ///
    /// Returns the number removed. Pair and ghost lists referencing the old
    /// indices are invalid afterwards and must be rebuilt.
    pub fn delete_by_tag(&mut self, tag: i32) -> Result<usize> {
        let before = self.items.len();
        self.items.retain(|p| p.tag != tag);
        let removed = before - self.items.len();
        if removed == 0 {
            return Err(Error::NoParticlesWithTag { tag });
        }
        Ok(removed)
    }
}

impl std::ops::Index<usize> for ParticleStore {
    type Output = Particle;
    fn index(&self, i: usize) -> &Particle {
        &self.items[i]
    }
}

impl std::ops::IndexMut<usize> for ParticleStore {
    fn index_mut(&mut self, i: usize) -> &mut Particle {
        &mut self.items[i]
    }
}

/// Clears the transient accumulator block. Called from barrier passes that
/// already hold `&mut`.
pub(crate) fn reset_accum(p: &mut Particle) {
    *p.accum.get_mut() = Accumulator::new();
}
