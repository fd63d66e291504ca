//! Smoothing-kernel weight and gradient functions.
//!
//! The rest of the core only relies on the call contract: `kernel` returns
//! the interpolation weight for a normalized distance `q = r / h`, and
//! `grad_kernel` returns the scalar `g` such that `∇W(x_ij) = g · x_ij`.
//! Both are pure. Two standard kernels ship with the crate; anything else
//! can be slotted in by matching the same contract.

use crate::domain::Dim;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Kernel family used for all weight evaluations in a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelKind {
    /// Cubic B-spline, compact support 2h.
    CubicSpline,
    /// Quintic spline, compact support 3h (smoother, wider stencil).
    QuinticSpline,
}

impl KernelKind {
    /// Support radius in units of `h`. The neighbor search must use the same
    /// factor when building pair lists.
    pub fn support_radius(self) -> f64 {
        match self {
            KernelKind::CubicSpline => 2.0,
            KernelKind::QuinticSpline => 3.0,
        }
    }
}

/// Kernel weight at normalized distance `q = r / h`.
pub fn kernel(dim: Dim, kind: KernelKind, q: f64, h: f64) -> f64 {
    match kind {
        KernelKind::CubicSpline => {
            let c = match dim {
                Dim::Two => 10.0 / (7.0 * PI * h * h),
                Dim::Three => 1.0 / (PI * h * h * h),
            };
            if q < 1.0 {
                c * (1.0 - 1.5 * q * q + 0.75 * q * q * q)
            } else if q < 2.0 {
                c * 0.25 * (2.0 - q).powi(3)
            } else {
                0.0
            }
        }
        KernelKind::QuinticSpline => {
            let c = match dim {
                Dim::Two => 7.0 / (478.0 * PI * h * h),
                Dim::Three => 3.0 / (359.0 * PI * h * h * h),
            };
            if q < 1.0 {
                c * ((3.0 - q).powi(5) - 6.0 * (2.0 - q).powi(5) + 15.0 * (1.0 - q).powi(5))
            } else if q < 2.0 {
                c * ((3.0 - q).powi(5) - 6.0 * (2.0 - q).powi(5))
            } else if q < 3.0 {
                c * (3.0 - q).powi(5)
            } else {
                0.0
            }
        }
    }
}

/// Scalar gradient factor: `∇W(x_ij) = grad_kernel(..) · x_ij`.
///
/// Returns 0 for coincident particles (q → 0); a pair at zero distance
/// carries no gradient information.
pub fn grad_kernel(dim: Dim, kind: KernelKind, q: f64, h: f64) -> f64 {
    if q < 1.0e-12 {
        return 0.0;
    }
    let dwdq = match kind {
        KernelKind::CubicSpline => {
            let c = match dim {
                Dim::Two => 10.0 / (7.0 * PI * h * h),
                Dim::Three => 1.0 / (PI * h * h * h),
            };
            if q < 1.0 {
                c * (-3.0 * q + 2.25 * q * q)
            } else if q < 2.0 {
                c * -0.75 * (2.0 - q) * (2.0 - q)
            } else {
                0.0
            }
        }
        KernelKind::QuinticSpline => {
            let c = match dim {
                Dim::Two => 7.0 / (478.0 * PI * h * h),
                Dim::Three => 3.0 / (359.0 * PI * h * h * h),
            };
            if q < 1.0 {
                c * -5.0
                    * ((3.0 - q).powi(4) - 6.0 * (2.0 - q).powi(4) + 15.0 * (1.0 - q).powi(4))
            } else if q < 2.0 {
                c * -5.0 * ((3.0 - q).powi(4) - 6.0 * (2.0 - q).powi(4))
            } else if q < 3.0 {
                c * -5.0 * (3.0 - q).powi(4)
            } else {
                0.0
            }
        }
    };
    dwdq / (q * h * h)
}
