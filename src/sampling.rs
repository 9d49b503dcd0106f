use std::f32::consts::PI;

use glam::{Quat, Vec3};
use rand::{rngs::SmallRng, Rng, RngCore, SeedableRng};

/// Source of uniform random numbers in [0, 1), threaded through every stochastic routine
pub trait Sampler {
    fn next_uniform(&mut self) -> f32;
}

impl<R: RngCore> Sampler for R {
    fn next_uniform(&mut self) -> f32 {
        self.gen::<f32>()
    }
}

/// Creates an independent generator for one pixel so results don't depend on thread scheduling
pub fn pixel_rng(seed: u64, x: u32, y: u32) -> SmallRng {
    let pixel = ((y as u64) << 32) | x as u64;
    SmallRng::seed_from_u64(seed ^ pixel.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Builds a direction from its angle to the +Y pole (yaw) and its angle around it (pitch)
fn from_pole_angles(yaw: f32, pitch: f32) -> Vec3 {
    let (sin_yaw, cos_yaw) = yaw.sin_cos();
    Vec3::new(sin_yaw * pitch.cos(), cos_yaw, sin_yaw * pitch.sin())
}

/// Cosine-weighted direction over the hemisphere around +Y
pub fn cosine_hemisphere(u1: f32, u2: f32) -> Vec3 {
    from_pole_angles(u1.sqrt().acos(), 2.0 * PI * u2)
}

/// Direction from a Phong lobe with exponent `shininess` around +Y
pub fn phong_lobe(u1: f32, u2: f32, shininess: f32) -> Vec3 {
    from_pole_angles(u1.powf((shininess + 1.0).recip()).acos(), 2.0 * PI * u2)
}

/// Uniform direction inside the cone of half-angle `cutoff` around +Y
pub fn uniform_cone(u1: f32, u2: f32, cutoff: f32) -> Vec3 {
    let cos_yaw = 1.0 - u1 * (1.0 - cutoff.cos());
    from_pole_angles(cos_yaw.clamp(-1.0, 1.0).acos(), 2.0 * PI * u2)
}

pub fn uniform_sphere(u1: f32, u2: f32) -> Vec3 {
    from_pole_angles((1.0 - 2.0 * u1).clamp(-1.0, 1.0).acos(), 2.0 * PI * u2)
}

/// Uniform point on the unit disk in the XZ plane
pub fn uniform_disk(u1: f32, u2: f32) -> Vec3 {
    let radius = u1.sqrt();
    let angle = 2.0 * PI * u2;
    Vec3::new(radius * angle.cos(), 0.0, radius * angle.sin())
}

/// Rotates a direction sampled around the +Y pole so that the pole lands on `axis`
pub fn rotate_to(sample: Vec3, axis: Vec3) -> Vec3 {
    Quat::from_rotation_arc(Vec3::Y, axis.normalize()).mul_vec3(sample)
}

pub fn reflect(incoming: Vec3, normal: Vec3) -> Vec3 {
    incoming - 2.0 * incoming.dot(normal) * normal
}

/// Refracts `incoming` through a surface with outward `normal` separating air from a medium of
/// the given index. Returns None on total internal reflection.
pub fn refract(incoming: Vec3, normal: Vec3, index_of_refraction: f32) -> Option<Vec3> {
    let incoming = incoming.normalize();
    let (normal, eta) = if normal.dot(incoming) < 0.0 {
        (normal, index_of_refraction.recip())
    } else {
        (-normal, index_of_refraction)
    };

    let cos_incident = -normal.dot(incoming);
    let discriminant = 1.0 - eta * eta * (1.0 - cos_incident * cos_incident);
    if discriminant < 0.0 {
        return None;
    }

    Some((eta * incoming + (eta * cos_incident - discriminant.sqrt()) * normal).normalize())
}
