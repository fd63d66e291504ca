//! Error taxonomy for the solver core.
//!
//! Only structurally fatal conditions become `Error` values. Recoverable
//! numerical events (singular correction matrices, clamped time steps) are
//! absorbed with safe defaults and surfaced through counters in
//! [`crate::domain::StepDiagnostics`] instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Dimension must be 2 or 3.
    #[error("invalid dimension {0}, expected 2 or 3")]
    InvalidDimension(usize),

    /// Periodic wrapping along X cannot coexist with inflow/outflow
    /// boundaries on the same axis.
    #[error("periodic boundary in X cannot be combined with in/out-flow boundaries")]
    PeriodicInflowConflict,

    /// Delete-by-tag matched nothing: the caller's view of the particle set
    /// is out of sync with the store.
    #[error("no particles with tag {tag} found to delete")]
    NoParticlesWithTag { tag: i32 },

    /// The free-surface detector classified zero particles. A particle cloud
    /// always has an outer boundary, so this indicates a mass or
    /// smoothing-length misconfiguration.
    #[error("no free-surface particles detected; check particle masses and radii")]
    NoSurfaceDetected,

    /// A pair bucket references an index outside the store, or a
    /// self-referential pair.
    #[error("invalid pair ({i}, {j}) for particle count {count}")]
    InvalidPair { i: usize, j: usize, count: usize },

    /// A ghost or correction flag references a symmetry plane that was
    /// never registered.
    #[error("plane index {plane} on particle {particle} out of range ({count} planes registered)")]
    UnregisteredPlane {
        particle: usize,
        plane: usize,
        count: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
