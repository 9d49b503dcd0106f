use std::fmt::Display;

use glam::Vec3;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use crate::{
    lights::Light,
    photon::{PathHistory, Photon, PhotonMap, PhotonStore},
    roulette::{continuation, russian_roulette, Interaction},
    sampling::Sampler,
    scene::Scene,
};

/// Which of the two emission passes is running, deciding which deposits are kept
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapKind {
    Global,
    Caustic,
}

/// Counters collected over one emission pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhotonStats {
    pub emitted: usize,
    pub deposited: usize,
    pub escaped: usize,
    pub capped: usize,
    pub diffuse: usize,
    pub specular: usize,
    pub transmission: usize,
    pub absorbed: usize,
}

pub struct PhotonMaps {
    pub global: PhotonMap,
    pub caustic: PhotonMap,
}

/// Random walk of single photons through a scene for one emission pass
pub struct PhotonTracer<'a> {
    scene: &'a Scene,
    kind: MapKind,
    max_bounces: u32,
}

impl MapKind {
    pub fn accepts(self, history: PathHistory) -> bool {
        match self {
            MapKind::Global => true,
            MapKind::Caustic => history == PathHistory::HadSpecularOrTransmissive,
        }
    }
}

impl Display for MapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapKind::Global => write!(f, "global"),
            MapKind::Caustic => write!(f, "caustic"),
        }
    }
}

impl PhotonStats {
    fn record(&mut self, interaction: Interaction) {
        match interaction {
            Interaction::DiffuseReflection => self.diffuse += 1,
            Interaction::SpecularReflection => self.specular += 1,
            Interaction::Transmission => self.transmission += 1,
            Interaction::Absorption => self.absorbed += 1,
        }
    }
}

/// Splits `total` photons across `light_count` lights. The first `total % light_count` lights
/// get one extra photon so none are lost to rounding.
pub fn photons_per_light(total: usize, light_count: usize) -> Vec<usize> {
    if light_count == 0 {
        return Vec::new();
    }

    let share = total / light_count;
    let remainder = total % light_count;
    (0..light_count)
        .map(|i| share + usize::from(i < remainder))
        .collect()
}

/// Initial photon leaving a light, carrying an even share of its power
pub fn emit_photon(light: &dyn Light, power: Vec3, sampler: &mut dyn Sampler) -> Photon {
    let ray = light.sample_emission_ray(sampler);
    Photon {
        position: ray.origin,
        incident_direction: ray.direction,
        power,
        history: PathHistory::NoSpecularYet,
    }
}

impl<'a> PhotonTracer<'a> {
    pub fn new(scene: &'a Scene, kind: MapKind, max_bounces: u32) -> Self {
        PhotonTracer {
            scene,
            kind,
            max_bounces,
        }
    }

    /// Follows `photon` until it leaves the scene, is absorbed or runs out of bounces,
    /// storing a copy at every diffuse surface the pass accepts
    pub fn trace(
        &self,
        photon: Photon,
        bounce: u32,
        store: &mut PhotonStore,
        sampler: &mut dyn Sampler,
        stats: &mut PhotonStats,
    ) {
        let Some(hit) = self.scene.intersect(&photon.ray()) else {
            stats.escaped += 1;
            return;
        };

        let brdf = self.scene.brdf(hit.element);
        if brdf.is_diffuse() && self.kind.accepts(photon.history) {
            store.insert(Photon {
                position: hit.point,
                ..photon
            });
            stats.deposited += 1;
        }

        if bounce >= self.max_bounces {
            stats.capped += 1;
            return;
        }

        let outcome = russian_roulette(brdf, photon.power, sampler);
        stats.record(outcome.interaction);

        let Some(direction) = continuation(
            outcome.interaction,
            photon.incident_direction,
            hit.normal,
            brdf,
            sampler,
        ) else {
            return;
        };

        let ray = hit.spawn_ray(direction);
        let next = Photon {
            position: ray.origin,
            incident_direction: ray.direction,
            power: outcome.weight,
            history: photon.history.after(outcome.interaction),
        };

        self.trace(next, bounce + 1, store, sampler, stats);
    }
}

/// Runs one emission pass and returns the photons it deposited
pub fn trace_photons(
    scene: &Scene,
    kind: MapKind,
    total_photons: usize,
    sampler: &mut dyn Sampler,
) -> (PhotonStore, PhotonStats) {
    let tracer = PhotonTracer::new(scene, kind, scene.settings.max_photon_bounces);
    let counts = photons_per_light(total_photons, scene.lights.len());

    let progress = ProgressBar::new(total_photons as u64);
    progress.set_style(
        ProgressStyle::with_template("{msg:>8} photons [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress.set_message(kind.to_string());

    let mut store = PhotonStore::new();
    let mut stats = PhotonStats::default();
    for (i, (light, count)) in scene.lights.iter().zip(counts).enumerate() {
        if count == 0 {
            debug!("Light {} gets no {} photons", i, kind);
            continue;
        }

        let power = light.total_power() / count as f32;
        info!("Light {} emits {} {} photons of power {}", i, count, kind, power);

        for _ in 0..count {
            let photon = emit_photon(light.as_ref(), power, sampler);
            tracer.trace(photon, 0, &mut store, sampler, &mut stats);
            stats.emitted += 1;
            progress.inc(1);
        }
    }
    progress.finish_and_clear();

    debug!(
        "{} pass: {} stored, {} escaped, {} capped, {} diffuse, {} specular, {} transmitted, {} absorbed",
        kind,
        stats.deposited,
        stats.escaped,
        stats.capped,
        stats.diffuse,
        stats.specular,
        stats.transmission,
        stats.absorbed
    );
    (store, stats)
}

/// Runs one emission pass and indexes the result. A pass that stores nothing yields an empty
/// map, which contributes no light.
pub fn build_photon_map(
    scene: &Scene,
    kind: MapKind,
    total_photons: usize,
    sampler: &mut dyn Sampler,
) -> PhotonMap {
    let (store, stats) = trace_photons(scene, kind, total_photons, sampler);
    let stored = store.len();

    match store.build() {
        Ok(map) => {
            info!(
                "Built {} photon map: {} photons stored from {} emitted",
                kind, stored, stats.emitted
            );
            map
        }
        Err(error) => {
            warn!("{} {}, using no {} light", kind, error, kind);
            PhotonMap::empty()
        }
    }
}

/// Both emission passes, sharing one sampler so a seed reproduces the maps
pub fn build_photon_maps(scene: &Scene, sampler: &mut dyn Sampler) -> PhotonMaps {
    let global = build_photon_map(scene, MapKind::Global, scene.settings.global_photons, sampler);
    let caustic = build_photon_map(
        scene,
        MapKind::Caustic,
        scene.settings.caustic_photons,
        sampler,
    );

    PhotonMaps { global, caustic }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lights::{Attenuation, DirectionalLight, PointLight},
        objects::{Brdf, Object, Quad, Sphere},
        scene::{Camera, RenderSettings},
    };
    use rand::{rngs::SmallRng, SeedableRng};

    fn camera() -> Camera {
        Camera::new(
            8,
            8,
            Vec3::new(0.0, 5.0, -5.0),
            Vec3::ZERO,
            Vec3::Y,
            60.0,
        )
    }

    fn floor(brdf: Brdf) -> Box<dyn Object> {
        Box::new(Quad::new(
            Vec3::new(-5.0, 0.0, -5.0),
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 0.0),
            brdf,
        ))
    }

    fn matte_plane() -> Scene {
        let lights: Vec<Box<dyn Light>> = vec![Box::new(PointLight::new(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::ONE,
            1.0,
            Attenuation::default(),
        ))];

        Scene::new(
            camera(),
            vec![floor(Brdf::diffuse(Vec3::splat(0.6)))],
            lights,
            Vec3::ZERO,
            RenderSettings::default(),
        )
    }

    /// A glass ball above a matte floor, lit from straight above
    fn glass_ball() -> Scene {
        let glass = Brdf {
            transmission: Vec3::ONE,
            index_of_refraction: 1.5,
            ..Brdf::default()
        };
        let objects = vec![
            floor(Brdf::diffuse(Vec3::splat(0.8))),
            Box::new(Sphere::new(Vec3::new(0.0, 2.0, 0.0), 1.0, glass)) as Box<dyn Object>,
        ];
        let lights: Vec<Box<dyn Light>> =
            vec![Box::new(DirectionalLight::new(-Vec3::Y, Vec3::ONE, 1.0))];

        Scene::new(camera(), objects, lights, Vec3::ZERO, RenderSettings::default())
    }

    #[test]
    fn test_photons_per_light_keeps_remainder() {
        assert_eq!(photons_per_light(10, 3), vec![4, 3, 3]);
        assert_eq!(photons_per_light(9, 3), vec![3, 3, 3]);
        assert_eq!(photons_per_light(2, 4), vec![1, 1, 0, 0]);
        assert!(photons_per_light(10, 0).is_empty());
        assert_eq!(photons_per_light(1000, 7).iter().sum::<usize>(), 1000);
    }

    #[test]
    fn test_caustic_pass_only_accepts_specular_paths() {
        assert!(MapKind::Global.accepts(PathHistory::NoSpecularYet));
        assert!(MapKind::Global.accepts(PathHistory::HadSpecularOrTransmissive));
        assert!(!MapKind::Caustic.accepts(PathHistory::NoSpecularYet));
        assert!(MapKind::Caustic.accepts(PathHistory::HadSpecularOrTransmissive));
    }

    #[test]
    fn test_emitted_photons_share_light_power() {
        let scene = matte_plane();
        let mut rng = SmallRng::seed_from_u64(1);
        let power = scene.lights[0].total_power() / 4.0;
        let photon = emit_photon(scene.lights[0].as_ref(), power, &mut rng);

        assert_eq!(photon.power, Vec3::splat(0.25));
        assert_eq!(photon.position, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(photon.history, PathHistory::NoSpecularYet);
    }

    #[test]
    fn test_matte_plane_fills_only_the_global_map() {
        let scene = matte_plane();
        let mut rng = SmallRng::seed_from_u64(17);

        let (caustic, caustic_stats) = trace_photons(&scene, MapKind::Caustic, 500, &mut rng);
        assert_eq!(caustic_stats.emitted, 500);
        assert_eq!(caustic_stats.specular, 0);
        assert_eq!(caustic_stats.transmission, 0);
        assert!(caustic.build().is_err());

        let (global, global_stats) = trace_photons(&scene, MapKind::Global, 500, &mut rng);
        assert_eq!(global_stats.specular, 0);
        assert_eq!(global_stats.transmission, 0);
        // The floor covers a sixth of the directions leaving the light
        assert!(global.len() > 40);
        for photon in global.photons() {
            assert!(photon.position.y.abs() < 1e-3);
            assert!(photon.power.cmpge(Vec3::ZERO).all());
        }

        assert!(build_photon_map(&scene, MapKind::Caustic, 100, &mut rng).is_empty());
    }

    #[test]
    fn test_glass_ball_focuses_caustic_photons() {
        let scene = glass_ball();
        let mut rng = SmallRng::seed_from_u64(23);
        let (caustic, stats) = trace_photons(&scene, MapKind::Caustic, 4000, &mut rng);

        assert!(stats.transmission > 0);
        assert!(!caustic.is_empty());
        for photon in caustic.photons() {
            assert_eq!(photon.history, PathHistory::HadSpecularOrTransmissive);
            assert!(photon.position.y.abs() < 1e-3);
        }

        // The ball focuses what passes through it onto a small spot under it
        let focused = caustic
            .photons()
            .iter()
            .filter(|photon| Vec3::new(photon.position.x, 0.0, photon.position.z).length() < 1.0)
            .count();
        assert!(2 * focused > caustic.len());
    }

    #[test]
    fn test_bounce_cap_stops_the_walk() {
        // Two facing perfect mirrors would bounce a photon forever
        let mirror = Brdf::mirror(Vec3::ONE, 1e6);
        let objects: Vec<Box<dyn Object>> = vec![
            Box::new(Quad::new(
                Vec3::new(-5.0, 0.0, -5.0),
                Vec3::new(0.0, 0.0, 10.0),
                Vec3::new(10.0, 0.0, 0.0),
                mirror.clone(),
            )),
            Box::new(Quad::new(
                Vec3::new(-5.0, 2.0, -5.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 10.0),
                mirror,
            )),
        ];
        let settings = RenderSettings {
            max_photon_bounces: 5,
            ..RenderSettings::default()
        };
        let scene = Scene::new(camera(), objects, Vec::new(), Vec3::ZERO, settings);

        let tracer = PhotonTracer::new(&scene, MapKind::Global, 5);
        let photon = Photon {
            position: Vec3::new(0.0, 1.0, 0.0),
            incident_direction: -Vec3::Y,
            power: Vec3::ONE,
            history: PathHistory::NoSpecularYet,
        };

        let mut store = PhotonStore::new();
        let mut stats = PhotonStats::default();
        let mut rng = SmallRng::seed_from_u64(5);
        tracer.trace(photon, 0, &mut store, &mut rng, &mut stats);

        assert_eq!(stats.capped, 1);
        assert_eq!(stats.specular, 5);
        assert!(store.is_empty());
    }

    #[test]
    fn test_same_seed_builds_the_same_map() {
        let scene = glass_ball();
        let run = || {
            let mut rng = SmallRng::seed_from_u64(99);
            let (store, _) = trace_photons(&scene, MapKind::Global, 300, &mut rng);
            store.photons().to_vec()
        };

        assert_eq!(run(), run());
    }
}
