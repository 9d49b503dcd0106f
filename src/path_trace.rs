use glam::Vec3;
use log::debug;

use crate::{
    objects::Ray,
    photon::PhotonMap,
    roulette::{continuation, sample_reflectance, Interaction, Probabilities},
    sampling::Sampler,
    scene::Scene,
};

/// Counters gathered while tracing camera paths, merged across pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraceStats {
    pub camera_rays: usize,
    pub rays: usize,
    pub deepest: u32,
    pub truncated: usize,
    pub diffuse: usize,
    pub specular: usize,
    pub transmission: usize,
    pub absorbed: usize,
}

/// Radiance estimator combining direct lighting, photon density estimates and recursive
/// continuation rays
pub struct PathTracer<'a> {
    scene: &'a Scene,
    global: &'a PhotonMap,
    caustic: &'a PhotonMap,
    nearest_photons: usize,
    max_depth: u32,
}

impl TraceStats {
    pub fn merge(self, other: TraceStats) -> TraceStats {
        TraceStats {
            camera_rays: self.camera_rays + other.camera_rays,
            rays: self.rays + other.rays,
            deepest: self.deepest.max(other.deepest),
            truncated: self.truncated + other.truncated,
            diffuse: self.diffuse + other.diffuse,
            specular: self.specular + other.specular,
            transmission: self.transmission + other.transmission,
            absorbed: self.absorbed + other.absorbed,
        }
    }

    fn record(&mut self, interaction: Interaction) {
        match interaction {
            Interaction::DiffuseReflection => self.diffuse += 1,
            Interaction::SpecularReflection => self.specular += 1,
            Interaction::Transmission => self.transmission += 1,
            Interaction::Absorption => self.absorbed += 1,
        }
    }
}

impl<'a> PathTracer<'a> {
    pub fn new(
        scene: &'a Scene,
        global: &'a PhotonMap,
        caustic: &'a PhotonMap,
        nearest_photons: usize,
        max_depth: u32,
    ) -> Self {
        PathTracer {
            scene,
            global,
            caustic,
            nearest_photons,
            max_depth,
        }
    }

    pub fn scene(&self) -> &Scene {
        self.scene
    }

    /// Estimates the light arriving back along `ray`, clamped to [0, 1] per channel.
    /// Paths reaching `max_depth` end there as if absorbed.
    pub fn trace_ray(
        &self,
        ray: &Ray,
        depth: u32,
        sampler: &mut dyn Sampler,
        stats: &mut TraceStats,
    ) -> Vec3 {
        stats.rays += 1;
        stats.deepest = stats.deepest.max(depth);

        let Some(hit) = self.scene.intersect(ray) else {
            return Vec3::ZERO;
        };

        let brdf = self.scene.brdf(hit.element);
        let normal = hit.facing_normal(ray.direction);
        let mut color = self.scene.ambient + brdf.emission;

        // Direct lighting, shadow rays go from each light towards the hit
        for light in &self.scene.lights {
            let origin = light.shadow_ray_origin(hit.point);
            if self.scene.is_visible(origin, &hit) {
                color += light.reflection(brdf, ray.origin, hit.point, normal);
            }
        }

        // Indirect and caustic light from the photon maps
        if brdf.is_diffuse() && self.nearest_photons > 0 {
            let indirect = self.global.estimate(hit.point, self.nearest_photons);
            let caustic = self.caustic.estimate(hit.point, self.nearest_photons);
            color += brdf.diffuse * (indirect + caustic);
        }

        if depth >= self.max_depth {
            if Probabilities::new(brdf, Vec3::ONE).total() > 0.0 {
                stats.truncated += 1;
                debug!("Path truncated at depth {} on element {}", depth, hit.element);
            }

            return color.clamp(Vec3::ZERO, Vec3::ONE);
        }

        let outcome = sample_reflectance(brdf, sampler);
        stats.record(outcome.interaction);

        if let Some(direction) =
            continuation(outcome.interaction, ray.direction, hit.normal, brdf, sampler)
        {
            let next_ray = hit.spawn_ray(direction);
            color += outcome.weight * self.trace_ray(&next_ray, depth + 1, sampler, stats);
        }

        color.clamp(Vec3::ZERO, Vec3::ONE)
    }
}
