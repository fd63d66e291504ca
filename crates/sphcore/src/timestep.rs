//! Adaptive time-step controller.
//!
//! Two stability criteria feed one global minimum: an acceleration bound
//! `k·sqrt(h/|a|)` and a CFL bound built from the minimum neighbor distance
//! and the signal speed. The reduction is a parallel scan with an atomic
//! fast path; the tracking mutex is taken only when a thread actually sees
//! a new minimum, so contention stays bounded by the number of violations
//! rather than the number of particles.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::particle::ParticleStore;

/// Global minimum tracker. The atomic holds the current minimum as f64
/// bits for a lock-free read; the mutex guards the (value, particle)
/// snapshot updated on an actual violation.
#[derive(Debug)]
pub struct MinTracker {
    bits: AtomicU64,
    state: Mutex<(f64, Option<usize>)>,
}

impl MinTracker {
    pub fn new() -> Self {
        MinTracker {
            bits: AtomicU64::new(f64::INFINITY.to_bits()),
            state: Mutex::new((f64::INFINITY, None)),
        }
    }

    /// Records `value` for `particle` if it is below the current minimum.
    /// Lock-free unless this thread is actually lowering the minimum.
    pub fn observe(&self, value: f64, particle: usize) {
        if value >= f64::from_bits(self.bits.load(Ordering::Relaxed)) {
            return;
        }
        let mut state = self.state.lock();
        if value < state.0 {
            *state = (value, Some(particle));
            self.bits.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn min(&self) -> (f64, Option<usize>) {
        *self.state.lock()
    }
}

impl Default for MinTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Controller state carried across steps.
#[derive(Debug)]
pub struct TimestepController {
    /// Caller's target step; the stable bound never exceeds it.
    pub dt_target: f64,
    /// Step actually taken, smoothed across changes of the bound.
    pub dt: f64,
    /// Safety constant for the acceleration criterion.
    pub sqrt_h_a: f64,
    /// CFL safety factor for the velocity criterion.
    pub cfl: f64,
    /// Absolute floor; a step clamped here is counted as a stability
    /// warning, not an error.
    pub dt_floor: f64,
    /// Use the velocity/CFL criterion instead of the acceleration one.
    pub use_cfl: bool,
    /// Particle that bound the step last time, for diagnostics.
    pub binding_particle: Option<usize>,
    /// Number of steps clamped to the floor so far.
    pub clamped_steps: u64,
}

impl TimestepController {
    pub fn new(dt_target: f64) -> Self {
        TimestepController {
            dt_target,
            dt: dt_target,
            sqrt_h_a: 0.0025,
            cfl: 0.7,
            dt_floor: 1.0e-10,
            use_cfl: false,
            binding_particle: None,
            clamped_steps: 0,
        }
    }

    /// Acceleration criterion `sqrt_h_a · sqrt(h / |a|)` over all free
    /// particles. Particles at rest (zero acceleration) are non-binding.
    pub fn accel_criterion(&self, store: &ParticleStore) -> (f64, Option<usize>) {
        let tracker = MinTracker::new();
        store
            .as_slice()
            .par_iter()
            .enumerate()
            .for_each(|(idx, p)| {
                if !p.is_free || p.is_ghost() {
                    return;
                }
                let a = p.a.length();
                if a > 0.0 {
                    tracker.observe(self.sqrt_h_a * (p.h / a).sqrt(), idx);
                }
            });
        tracker.min()
    }

    /// CFL criterion `cfl · min_neighbor_dist / (cs + |v|)`. Requires the
    /// per-particle minimum neighbor distance accumulated by the force
    /// pass; isolated particles (no neighbors) are non-binding.
    pub fn velocity_criterion(&self, store: &ParticleStore) -> (f64, Option<usize>) {
        let tracker = MinTracker::new();
        store
            .as_slice()
            .par_iter()
            .enumerate()
            .for_each(|(idx, p)| {
                if !p.is_free || p.is_ghost() {
                    return;
                }
                let dist = p.accum.lock().min_dist;
                let signal = p.cs + p.v.length();
                if dist.is_finite() && signal > 0.0 {
                    tracker.observe(self.cfl * dist / signal, idx);
                }
            });
        tracker.min()
    }

    /// Harmonic blend toward a new bound. A bound below the current step
    /// shrinks it smoothly; a bound at or above it is taken directly, so
    /// the step recovers without overshooting past the bound.
    pub fn blend(dt: f64, bound: f64) -> f64 {
        if bound < dt {
            2.0 * dt * bound / (dt + bound)
        } else {
            bound
        }
    }

    /// Advances the controller with this step's stability bound and an
    /// optional contact-derived floor. Returns the step to integrate with.
    pub fn advance(
        &mut self,
        bound: f64,
        binding_particle: Option<usize>,
        contact_min: Option<f64>,
    ) -> f64 {
        let mut target = bound.min(self.dt_target);
        if let Some(c) = contact_min {
            target = target.min(c);
        }
        self.dt = Self::blend(self.dt, target);
        self.binding_particle = binding_particle;

        if self.dt <= self.dt_floor {
            self.dt = self.dt_floor;
            self.clamped_steps += 1;
            log::warn!(
                "time step clamped to floor {:e} (bound from particle {:?})",
                self.dt_floor,
                binding_particle
            );
        }
        self.dt
    }
}
