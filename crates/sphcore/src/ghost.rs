//! Ghost/mirror boundary synchronization.
//!
//! Ghost particles duplicate a real source particle across a symmetry
//! plane. Material state (stress, strain, density) is copied as-is;
//! kinematics are reconstructed per ghost: axis mirrors negate one
//! component, oblique mirrors rebuild the vector from its tangential
//! components only.

use glam::DVec3;
use rayon::prelude::*;

use crate::pairs::GhostPair;
use crate::particle::{GhostKind, ParticleStore};

/// Symmetry-plane descriptor: unit normal plus two orthogonal in-plane
/// tangents.
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: DVec3,
    pub tangents: [DVec3; 2],
}

impl Plane {
    /// Builds a plane from a (not necessarily unit) normal, choosing an
    /// arbitrary orthonormal tangent basis.
    pub fn from_normal(normal: DVec3) -> Self {
        let n = normal.normalize();
        let t0 = n.any_orthonormal_vector();
        let t1 = n.cross(t0);
        Plane {
            normal: n,
            tangents: [t0, t1],
        }
    }

    /// Normal and tangential scalar components of `v`.
    pub fn decompose(&self, v: DVec3) -> (f64, f64, f64) {
        (
            v.dot(self.normal),
            v.dot(self.tangents[0]),
            v.dot(self.tangents[1]),
        )
    }

    /// Rebuilds `v` with its normal component removed (reflected to the
    /// plane), keeping the tangential components.
    pub fn tangential(&self, v: DVec3) -> DVec3 {
        let (_, t0, t1) = self.decompose(v);
        t0 * self.tangents[0] + t1 * self.tangents[1]
    }
}

fn mirror_axis(v: DVec3, axis: usize) -> DVec3 {
    let mut out = v;
    match axis {
        0 => out.x = -out.x,
        1 => out.y = -out.y,
        _ => out.z = -out.z,
    }
    out
}

/// Full ghost sync: material state copied, kinematics reconstructed.
///
/// Runs serially; each ghost pair reads one source and writes one ghost,
/// and ghost indices never alias source indices.
pub fn move_ghosts(
    store: &mut ParticleStore,
    ghost_pairs: &[GhostPair],
    planes: &[Plane],
    zero_ghost_accel: bool,
) {
    for &(src, ghost) in ghost_pairs {
        let s = &store[src];
        let (v, a, sigma, strain, shear, strain_rate, rotation_rate, density) = (
            s.v,
            s.a,
            s.sigma,
            s.strain,
            s.shear_stress,
            s.strain_rate,
            s.rotation_rate,
            s.density,
        );

        let g = &mut store[ghost];
        g.sigma = sigma;
        g.strain = strain;
        g.shear_stress = shear;
        g.strain_rate = strain_rate;
        g.rotation_rate = rotation_rate;
        g.density = density;

        match g.ghost {
            Some(GhostKind::MirrorAxis(axis)) => {
                g.v = mirror_axis(v, axis);
                g.a = if zero_ghost_accel {
                    DVec3::ZERO
                } else {
                    mirror_axis(a, axis)
                };
            }
            Some(GhostKind::Symmetric(plane_idx)) => {
                let plane = &planes[plane_idx];
                g.v = plane.tangential(v) - plane.normal.dot(v) * plane.normal;
                g.a = if zero_ghost_accel {
                    DVec3::ZERO
                } else {
                    plane.tangential(a) - plane.normal.dot(a) * plane.normal
                };
            }
            None => {}
        }
    }
}

/// Lightweight sync between full syncs: material state only, kinematics
/// untouched.
pub fn prop_ghosts(store: &mut ParticleStore, ghost_pairs: &[GhostPair]) {
    for &(src, ghost) in ghost_pairs {
        let s = &store[src];
        let (sigma, strain, shear, density, pl_strain) =
            (s.sigma, s.strain, s.shear_stress, s.density, s.pl_strain);
        let g = &mut store[ghost];
        g.sigma = sigma;
        g.strain = strain;
        g.shear_stress = shear;
        g.density = density;
        g.pl_strain = pl_strain;
    }
}

/// In-place symmetry correction for non-ghost particles: flagged boundary
/// particles keep only the tangential parts of velocity and acceleration;
/// fixed (non-free) boundary particles get their in-plane x/y kinematics
/// zeroed outright.
pub fn correct_vel_acc(store: &mut ParticleStore, planes: &[Plane]) {
    store.as_mut_slice().par_iter_mut().for_each(|p| {
        if p.is_ghost() {
            return;
        }
        if let Some(plane_idx) = p.correct_plane {
            let plane = &planes[plane_idx];
            p.v = plane.tangential(p.v);
            p.a = plane.tangential(p.a);
        }
        if !p.is_free {
            p.v.x = 0.0;
            p.v.y = 0.0;
            p.a.x = 0.0;
            p.a.y = 0.0;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;
    use approx::assert_relative_eq;
    use glam::DMat3;

    fn ghost_setup(kind: GhostKind) -> (ParticleStore, Vec<GhostPair>) {
        let mut store = ParticleStore::new();
        let mut src = Particle::new(DVec3::ZERO, 1000.0, 1.0, 0.1);
        src.v = DVec3::new(1.0, 2.0, 3.0);
        src.a = DVec3::new(-4.0, 5.0, 0.5);
        src.sigma = DMat3::from_diagonal(DVec3::new(1.0, 2.0, 3.0));
        src.density = 1234.0;
        store.push(src);
        let mut ghost = Particle::new(DVec3::X, 1000.0, 1.0, 0.1);
        ghost.ghost = Some(kind);
        ghost.is_free = false;
        store.push(ghost);
        (store, vec![(0, 1)])
    }

    #[test]
    fn axis_mirror_negates_one_component() {
        let (mut store, pairs) = ghost_setup(GhostKind::MirrorAxis(1));
        move_ghosts(&mut store, &pairs, &[], false);
        assert_eq!(store[1].v, DVec3::new(1.0, -2.0, 3.0));
        assert_eq!(store[1].a, DVec3::new(-4.0, -5.0, 0.5));
        assert_eq!(store[1].density, 1234.0);
        assert_eq!(store[1].sigma, store[0].sigma);
    }

    #[test]
    fn zeroed_ghost_acceleration() {
        let (mut store, pairs) = ghost_setup(GhostKind::MirrorAxis(0));
        move_ghosts(&mut store, &pairs, &[], true);
        assert_eq!(store[1].a, DVec3::ZERO);
        assert_eq!(store[1].v, DVec3::new(-1.0, 2.0, 3.0));
    }

    #[test]
    fn oblique_mirror_reflects_normal_component() {
        let n = DVec3::new(1.0, 1.0, 0.0).normalize();
        let plane = Plane::from_normal(n);
        let (mut store, pairs) = ghost_setup(GhostKind::Symmetric(0));
        move_ghosts(&mut store, &pairs, &[plane], false);

        let sv = store[0].v;
        let gv = store[1].v;
        assert_relative_eq!(gv.dot(n), -sv.dot(n), epsilon = 1.0e-12);
        for t in plane.tangents {
            assert_relative_eq!(gv.dot(t), sv.dot(t), epsilon = 1.0e-12);
        }
    }

    #[test]
    fn prop_ghost_leaves_kinematics_alone() {
        let (mut store, pairs) = ghost_setup(GhostKind::MirrorAxis(0));
        store[1].v = DVec3::splat(9.0);
        store[0].pl_strain = 0.25;
        prop_ghosts(&mut store, &pairs);
        assert_eq!(store[1].v, DVec3::splat(9.0));
        assert_eq!(store[1].sigma, store[0].sigma);
        assert_relative_eq!(store[1].pl_strain, 0.25);
    }

    #[test]
    fn correction_pass_strips_normal_component() {
        let plane = Plane::from_normal(DVec3::Z);
        let mut store = ParticleStore::new();
        let mut p = Particle::new(DVec3::ZERO, 1000.0, 1.0, 0.1);
        p.v = DVec3::new(1.0, 2.0, 3.0);
        p.a = DVec3::new(0.5, 0.0, -2.0);
        p.correct_plane = Some(0);
        store.push(p);

        correct_vel_acc(&mut store, &[plane]);
        assert_relative_eq!(store[0].v.dot(DVec3::Z), 0.0, epsilon = 1.0e-12);
        assert_relative_eq!(store[0].a.dot(DVec3::Z), 0.0, epsilon = 1.0e-12);
        assert_relative_eq!(store[0].v.x, 1.0, epsilon = 1.0e-12);
        assert_relative_eq!(store[0].v.y, 2.0, epsilon = 1.0e-12);
    }

    #[test]
    fn fixed_corrected_particle_gets_both_corrections() {
        // A fixed particle flagged for plane correction loses its normal
        // component to the plane and its x/y components to the fixed
        // zeroing; with a z-normal plane nothing survives.
        let plane = Plane::from_normal(DVec3::Z);
        let mut store = ParticleStore::new();
        let mut p = Particle::new(DVec3::ZERO, 1000.0, 1.0, 0.1);
        p.is_free = false;
        p.correct_plane = Some(0);
        p.v = DVec3::new(1.0, 2.0, 3.0);
        p.a = DVec3::new(4.0, 5.0, 6.0);
        store.push(p);

        correct_vel_acc(&mut store, &[plane]);
        assert_relative_eq!(store[0].v.length(), 0.0, epsilon = 1.0e-12);
        assert_relative_eq!(store[0].a.length(), 0.0, epsilon = 1.0e-12);
    }

    #[test]
    fn fixed_particles_lose_in_plane_kinematics() {
        let mut store = ParticleStore::new();
        let mut p = Particle::new(DVec3::ZERO, 1000.0, 1.0, 0.1);
        p.is_free = false;
        p.v = DVec3::new(1.0, 2.0, 3.0);
        p.a = DVec3::new(4.0, 5.0, 6.0);
        store.push(p);

        correct_vel_acc(&mut store, &[]);
        assert_eq!(store[0].v, DVec3::new(0.0, 0.0, 3.0));
        assert_eq!(store[0].a, DVec3::new(0.0, 0.0, 6.0));
    }
}
