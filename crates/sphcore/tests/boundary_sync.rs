//! Ghost synchronization and symmetry corrections through the domain API.

use approx::assert_relative_eq;
use glam::{DMat3, DVec3};
use sphcore::{Dim, Domain, GhostKind, Particle, Plane, SimConfig};

fn domain_2d() -> Domain {
    let cfg = SimConfig {
        dim: Dim::Two,
        gravity: DVec3::ZERO,
        ..SimConfig::default()
    };
    Domain::new(cfg, 1.0e-4)
}

fn moving_particle(x: DVec3) -> Particle {
    let mut p = Particle::new(x, 1000.0, 1.0, 0.1);
    p.v = DVec3::new(0.8, -0.3, 0.1);
    p.a = DVec3::new(2.0, 1.0, -0.5);
    p.sigma = DMat3::from_diagonal(DVec3::new(-5.0, -7.0, 0.0));
    p.pl_strain = 0.04;
    p
}

#[test]
fn axis_mirror_ghost_after_post_integrate() {
    let mut dom = domain_2d();
    dom.particles.push(moving_particle(DVec3::ZERO));
    let mut ghost = Particle::new(DVec3::new(0.0, -0.1, 0.0), 1000.0, 1.0, 0.1);
    ghost.is_free = false;
    ghost.ghost = Some(GhostKind::MirrorAxis(1));
    dom.particles.push(ghost);
    dom.ghost_pairs.push((0, 1));
    dom.validate().unwrap();

    dom.post_integrate(1.0e-4);

    let src = &dom.particles[0];
    let g = &dom.particles[1];
    assert_relative_eq!(g.v.x, src.v.x);
    assert_relative_eq!(g.v.y, -src.v.y);
    assert_relative_eq!(g.v.z, src.v.z);
    assert_relative_eq!(g.a.y, -src.a.y);
    assert_eq!(g.sigma, src.sigma);
    assert_relative_eq!(g.density, src.density);
}

#[test]
fn oblique_ghost_reflects_across_plane() {
    let normal = DVec3::new(1.0, 2.0, 0.0).normalize();
    let plane = Plane::from_normal(normal);

    let mut dom = domain_2d();
    dom.planes.push(plane);
    dom.particles.push(moving_particle(DVec3::ZERO));
    let mut ghost = Particle::new(DVec3::new(0.1, 0.2, 0.0), 1000.0, 1.0, 0.1);
    ghost.is_free = false;
    ghost.ghost = Some(GhostKind::Symmetric(0));
    dom.particles.push(ghost);
    dom.ghost_pairs.push((0, 1));

    dom.post_integrate(1.0e-4);

    let sv = dom.particles[0].v;
    let gv = dom.particles[1].v;
    assert_relative_eq!(gv.dot(normal), -sv.dot(normal), epsilon = 1.0e-12);
    for t in plane.tangents {
        assert_relative_eq!(gv.dot(t), sv.dot(t), epsilon = 1.0e-12);
    }
}

#[test]
fn zero_ghost_accel_option() {
    let mut dom = domain_2d();
    dom.cfg.zero_ghost_accel = true;
    dom.particles.push(moving_particle(DVec3::ZERO));
    let mut ghost = Particle::new(DVec3::X, 1000.0, 1.0, 0.1);
    ghost.is_free = false;
    ghost.ghost = Some(GhostKind::MirrorAxis(0));
    dom.particles.push(ghost);
    dom.ghost_pairs.push((0, 1));

    dom.post_integrate(1.0e-4);
    assert_eq!(dom.particles[1].a, DVec3::ZERO);
    assert_relative_eq!(dom.particles[1].v.x, -dom.particles[0].v.x);
}

#[test]
fn propagate_ghosts_copies_material_state_only() {
    let mut dom = domain_2d();
    dom.particles.push(moving_particle(DVec3::ZERO));
    let mut ghost = Particle::new(DVec3::X, 900.0, 1.0, 0.1);
    ghost.is_free = false;
    ghost.ghost = Some(GhostKind::MirrorAxis(0));
    ghost.v = DVec3::splat(7.0);
    dom.particles.push(ghost);
    dom.ghost_pairs.push((0, 1));

    dom.propagate_ghosts();

    assert_eq!(dom.particles[1].sigma, dom.particles[0].sigma);
    assert_relative_eq!(dom.particles[1].density, dom.particles[0].density);
    assert_relative_eq!(dom.particles[1].pl_strain, 0.04);
    // Kinematics untouched by the lightweight sync.
    assert_eq!(dom.particles[1].v, DVec3::splat(7.0));
}

#[test]
fn flagged_boundary_particle_is_corrected_in_place() {
    let plane = Plane::from_normal(DVec3::Y);
    let mut dom = domain_2d();
    dom.planes.push(plane);
    let mut p = moving_particle(DVec3::ZERO);
    p.correct_plane = Some(0);
    dom.particles.push(p);

    dom.post_integrate(1.0e-4);

    assert_relative_eq!(dom.particles[0].v.y, 0.0, epsilon = 1.0e-12);
    assert_relative_eq!(dom.particles[0].a.y, 0.0, epsilon = 1.0e-12);
    assert_relative_eq!(dom.particles[0].v.x, 0.8, epsilon = 1.0e-12);
}
