//! Equation of state: density to pressure.

use serde::{Deserialize, Serialize};

/// Pressure closure evaluated from density.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PressureModel {
    /// Linear acoustic relation `p = p0 + cs²(ρ − ρ0)`.
    Linear,
    /// Tait / Cole relation, stiff for weakly compressible liquids.
    Tait { gamma: f64 },
}

impl Default for PressureModel {
    fn default() -> Self {
        PressureModel::Tait { gamma: 7.0 }
    }
}

/// Pressure for the given model, sound speed, reference pressure, current
/// density and reference density.
pub fn eos(model: PressureModel, cs: f64, p0: f64, density: f64, ref_density: f64) -> f64 {
    match model {
        PressureModel::Linear => p0 + cs * cs * (density - ref_density),
        PressureModel::Tait { gamma } => {
            p0 + (ref_density * cs * cs / gamma) * ((density / ref_density).powf(gamma) - 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reference_density_gives_reference_pressure() {
        assert_relative_eq!(eos(PressureModel::Linear, 30.0, 5.0, 1000.0, 1000.0), 5.0);
        assert_relative_eq!(
            eos(PressureModel::Tait { gamma: 7.0 }, 30.0, 5.0, 1000.0, 1000.0),
            5.0
        );
    }

    #[test]
    fn compression_raises_pressure() {
        let linear = eos(PressureModel::Linear, 30.0, 0.0, 1010.0, 1000.0);
        let tait = eos(PressureModel::Tait { gamma: 7.0 }, 30.0, 0.0, 1010.0, 1000.0);
        assert!(linear > 0.0);
        assert!(tait > 0.0);
        // Tait is stiffer than linear for the same compression ratio.
        assert!(tait > linear);
    }

    #[test]
    fn rarefaction_lowers_pressure() {
        assert!(eos(PressureModel::Linear, 30.0, 0.0, 990.0, 1000.0) < 0.0);
    }
}
