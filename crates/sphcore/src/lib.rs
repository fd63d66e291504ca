//! Per-step numerical core of an SPH solver for continuum mechanics
//! (solids, fluids, soils).
//!
//! Given a particle cloud with physical state and a neighbor-pair
//! partition supplied by an external search, this crate computes
//! inter-particle forces with fine-grained per-particle locking, selects a
//! stable time step from competing criteria, synchronizes ghost particles
//! across symmetry planes, detects the free surface, and builds the
//! Bonet-Lok gradient-correction matrices.
//!
//! The driving loop belongs to the caller:
//!
//! ```no_run
//! use glam::DVec3;
//! use sphcore::{Dim, Domain, Particle, SimConfig};
//!
//! let cfg = SimConfig { dim: Dim::Two, ..SimConfig::default() };
//! let mut dom = Domain::new(cfg, 1.0e-4);
//! dom.particles.push(Particle::new(DVec3::ZERO, 1000.0, 0.01, 0.012));
//! // ... fill the store, run the neighbor search into dom.pairs ...
//! dom.validate().unwrap();
//! dom.init_pressures();
//! dom.on_pairs_rebuilt().unwrap();
//! loop {
//!     let dt = dom.step();
//!     // integrate positions/velocities/stress with dt (external)
//!     dom.post_integrate(dt);
//!     # break;
//! }
//! ```

pub mod boundary;
pub mod domain;
pub mod eos;
pub mod error;
pub mod forces;
pub mod ghost;
pub mod gradcorr;
pub mod kernel;
pub mod pairs;
pub mod particle;
pub mod surface;
pub mod timestep;

pub use boundary::{apply_axisymmetric_bc, apply_flow_boundary, BoundaryZones, FlowBoundary, FlowHook};
pub use domain::{ContactModel, Dim, Domain, SimConfig, StepDiagnostics};
pub use eos::{eos, PressureModel};
pub use error::{Error, Result};
pub use forces::{ForceModel, MonaghanForce, PairTerms};
pub use ghost::{correct_vel_acc, move_ghosts, prop_ghosts, Plane};
pub use gradcorr::build_correction_matrices;
pub use kernel::{grad_kernel, kernel, KernelKind};
pub use pairs::{GhostPair, Pair, PairPartition};
pub use particle::{Accumulator, GhostKind, Particle, ParticleStore};
pub use surface::detect_free_surface;
pub use timestep::{MinTracker, TimestepController};
