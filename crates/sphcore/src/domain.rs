//! Simulation context and per-step orchestration.
//!
//! `Domain` owns the particle store, the pair partition, the ghost
//! registry, and the time-step controller, and drives the phase sequence
//! for one step. Every phase takes the context by reference; there is no
//! process-wide state.

use glam::DVec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::boundary::{apply_axisymmetric_bc, apply_flow_boundary, BoundaryZones, FlowBoundary};
use crate::eos::{eos, PressureModel};
use crate::error::{Error, Result};
use crate::forces::{
    accumulate_pair_forces, apply_pair_forces, finalize_fixed_particles, reset_pass,
    smooth_fixed_particles, ForceModel, MonaghanForce,
};
use crate::ghost::{correct_vel_acc, move_ghosts, prop_ghosts, Plane};
use crate::gradcorr::build_correction_matrices;
use crate::kernel::KernelKind;
use crate::pairs::{GhostPair, PairPartition};
use crate::particle::{GhostKind, ParticleStore};
use crate::surface::detect_free_surface;
use crate::timestep::TimestepController;

/// Spatial dimension tag. 2D runs carry z components but keep them zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dim {
    Two,
    Three,
}

impl Dim {
    pub fn from_usize(d: usize) -> Result<Self> {
        match d {
            2 => Ok(Dim::Two),
            3 => Ok(Dim::Three),
            other => Err(Error::InvalidDimension(other)),
        }
    }
}

/// Static configuration, fixed for the lifetime of a `Domain`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimConfig {
    pub dim: Dim,
    pub gravity: DVec3,
    pub kernel: KernelKind,
    pub pressure_model: PressureModel,
    /// Periodic wrapping per axis.
    pub periodic: [bool; 3],
    /// Domain extent per axis, used for the periodic image correction.
    pub domain_lengths: DVec3,
    /// Treat x as the radial coordinate of an axisymmetric formulation.
    pub axisymmetric: bool,
    /// Force ghost accelerations to zero instead of mirroring them.
    pub zero_ghost_accel: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            dim: Dim::Three,
            gravity: DVec3::new(0.0, -9.81, 0.0),
            kernel: KernelKind::CubicSpline,
            pressure_model: PressureModel::default(),
            periodic: [false; 3],
            domain_lengths: DVec3::ZERO,
            axisymmetric: false,
            zero_ghost_accel: false,
        }
    }
}

impl SimConfig {
    /// Maps a relative position to its nearest periodic image.
    pub fn periodic_correction(&self, mut xij: DVec3) -> DVec3 {
        for axis in 0..3 {
            if !self.periodic[axis] {
                continue;
            }
            let l = self.domain_lengths[axis];
            if l <= 0.0 {
                continue;
            }
            if xij[axis] > 0.5 * l {
                xij[axis] -= l;
            } else if xij[axis] < -0.5 * l {
                xij[axis] += l;
            }
        }
        xij
    }
}

/// Contact-force module, invoked once per step after the pair force pass.
pub trait ContactModel: Send + Sync {
    /// Applies contact forces and returns the contact-derived minimum
    /// stable step, if the model computes one.
    fn apply(&self, store: &mut ParticleStore, cfg: &SimConfig) -> Option<f64>;
}

/// Per-step diagnostics surfaced to the caller. Recovered numerical events
/// land here instead of in the error channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepDiagnostics {
    /// Singular correction matrices replaced by the identity at the last
    /// rebuild.
    pub singular_matrices: usize,
    /// Steps clamped to the controller floor since construction.
    pub clamped_steps: u64,
    /// Surface particles at the last detector run.
    pub surface_particles: usize,
    /// Particle that bound the time step, if any did.
    pub binding_particle: Option<usize>,
    /// Step actually taken.
    pub dt: f64,
}

/// The simulation context.
pub struct Domain {
    pub cfg: SimConfig,
    pub particles: ParticleStore,
    pub pairs: PairPartition,
    pub ghost_pairs: Vec<GhostPair>,
    pub planes: Vec<Plane>,
    pub zones: BoundaryZones,
    pub flow: FlowBoundary,
    pub timestep: TimestepController,
    pub diagnostics: StepDiagnostics,
    pub time: f64,
    force_model: Box<dyn ForceModel>,
    contact: Option<Box<dyn ContactModel>>,
}

impl Domain {
    pub fn new(cfg: SimConfig, dt_target: f64) -> Self {
        Domain {
            cfg,
            particles: ParticleStore::new(),
            pairs: PairPartition::default(),
            ghost_pairs: Vec::new(),
            planes: Vec::new(),
            zones: BoundaryZones::default(),
            flow: FlowBoundary::None,
            timestep: TimestepController::new(dt_target),
            diagnostics: StepDiagnostics::default(),
            time: 0.0,
            force_model: Box::new(MonaghanForce::default()),
            contact: None,
        }
    }

    pub fn set_force_model(&mut self, model: Box<dyn ForceModel>) {
        self.force_model = model;
    }

    pub fn set_contact_model(&mut self, model: Box<dyn ContactModel>) {
        self.contact = Some(model);
    }

    /// Configuration sanity checks, run once before stepping.
    pub fn validate(&self) -> Result<()> {
        if self.cfg.periodic[0] && self.flow.drives_flow() {
            return Err(Error::PeriodicInflowConflict);
        }
        self.pairs.validate(self.particles.len())?;
        for &(src, ghost) in &self.ghost_pairs {
            if src >= self.particles.len()
                || ghost >= self.particles.len()
                || self.particles[src].is_ghost()
                || !self.particles[ghost].is_ghost()
            {
                return Err(Error::InvalidPair {
                    i: src,
                    j: ghost,
                    count: self.particles.len(),
                });
            }
        }
        // Every plane handle must resolve before the sync passes index
        // into the plane table.
        for (i, p) in self.particles.iter().enumerate() {
            if let Some(GhostKind::Symmetric(idx)) = p.ghost {
                if idx >= self.planes.len() {
                    return Err(Error::UnregisteredPlane {
                        particle: i,
                        plane: idx,
                        count: self.planes.len(),
                    });
                }
            }
            if let Some(idx) = p.correct_plane {
                if idx >= self.planes.len() {
                    return Err(Error::UnregisteredPlane {
                        particle: i,
                        plane: idx,
                        count: self.planes.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Seeds pressures from the equation of state. Run once after setup.
    pub fn init_pressures(&mut self) {
        let model = self.cfg.pressure_model;
        self.particles.as_mut_slice().par_iter_mut().for_each(|p| {
            p.pressure = eos(model, p.cs, p.ref_pressure, p.density, p.ref_density);
        });
    }

    /// Called after the external neighbor search delivers a fresh pair
    /// partition: validates it, refreshes cached neighbor counts, rebuilds
    /// the correction matrices, and re-runs surface detection.
    pub fn on_pairs_rebuilt(&mut self) -> Result<()> {
        self.pairs.validate(self.particles.len())?;
        let counts = self.pairs.neighbor_counts(self.particles.len());
        for (p, c) in self.particles.iter_mut().zip(counts) {
            p.nb_count = c;
        }
        self.diagnostics.singular_matrices =
            build_correction_matrices(&mut self.particles, &self.pairs, &self.cfg);
        self.diagnostics.surface_particles =
            detect_free_surface(&mut self.particles, &self.pairs, &self.cfg)?;
        Ok(())
    }

    /// One force-accumulation cycle plus time-step selection. Returns the
    /// step the external integrator should take. Integration itself is the
    /// caller's job; call [`Domain::post_integrate`] afterwards.
    pub fn step(&mut self) -> f64 {
        // 1. Clear accumulators, seed gravity, rebuild stabilization
        //    tensors.
        reset_pass(&mut self.particles, &self.cfg);

        // 2. Smooth pressure/stress/velocity onto the boundary material.
        smooth_fixed_particles(&self.particles, &self.pairs, &self.cfg);
        finalize_fixed_particles(&mut self.particles, &self.cfg);

        // 3. Pairwise forces over both pair sets.
        accumulate_pair_forces(
            &self.particles,
            &self.pairs,
            self.force_model.as_ref(),
            &self.cfg,
        );
        apply_pair_forces(&mut self.particles);

        // 4. Contact forces, if enabled.
        let contact_min = self
            .contact
            .as_ref()
            .and_then(|c| c.apply(&mut self.particles, &self.cfg));

        // 5. Stability bound and smoothed step selection.
        let (bound, who) = if self.timestep.use_cfl {
            self.timestep.velocity_criterion(&self.particles)
        } else {
            self.timestep.accel_criterion(&self.particles)
        };
        let dt = self.timestep.advance(bound, who, contact_min);

        self.diagnostics.binding_particle = self.timestep.binding_particle;
        self.diagnostics.clamped_steps = self.timestep.clamped_steps;
        self.diagnostics.dt = dt;
        dt
    }

    /// Post-integration phase: ghost sync, boundary corrections, flow
    /// prescriptions, smoothing-length adaptation, clock advance.
    pub fn post_integrate(&mut self, dt: f64) {
        move_ghosts(
            &mut self.particles,
            &self.ghost_pairs,
            &self.planes,
            self.cfg.zero_ghost_accel,
        );
        if !self.planes.is_empty() {
            correct_vel_acc(&mut self.particles, &self.planes);
        }
        if self.cfg.axisymmetric {
            apply_axisymmetric_bc(&mut self.particles, &self.zones);
        }
        apply_flow_boundary(&mut self.particles, &self.zones, &self.flow, self.time);
        self.update_smoothing_length(dt);
        self.time += dt;
    }

    /// Material-state-only ghost refresh between full syncs.
    pub fn propagate_ghosts(&mut self) {
        prop_ghosts(&mut self.particles, &self.ghost_pairs);
    }

    /// Density-divergence smoothing-length adaptation:
    /// `h ← h − (h/3)·(dρ/dt / ρ)·dt`, clamped to `[h_min, h_max]`.
    pub fn update_smoothing_length(&mut self, dt: f64) {
        self.particles.as_mut_slice().par_iter_mut().for_each(|p| {
            if !p.is_free || p.is_ghost() {
                return;
            }
            let h = p.h - (p.h / 3.0) * (p.drho / p.density) * dt;
            p.h = h.clamp(p.h_min, p.h_max);
        });
    }
}
