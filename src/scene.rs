use glam::{Vec2, Vec3};

use crate::{
    lights::Light,
    objects::{Brdf, Hit, Object, Ray},
};

/// Shadow-ray blockers closer than this to the shaded point are treated as the point itself
const SHADOW_EPSILON: f32 = 0.001;

/// Image buffer, stored top row first
pub struct Film {
    pub screen_width: u32,
    pub screen_height: u32,
    pub pixel_data: Vec<Vec3>,
}

pub struct Camera {
    pub screen_width: u32,
    pub screen_height: u32,
    pub world_origin: Vec3,
    pub world_width: f32,
    pub world_height: f32,
    pub world_position: Vec3,
    pub world_u: Vec3,
    pub world_v: Vec3,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    pub samples_per_pixel: u32,
    pub max_ray_depth: u32,
    pub global_photons: usize,
    pub caustic_photons: usize,
    pub nearest_photons: usize,
    pub max_photon_bounces: u32,
    pub seed: u64,
}

/// Bounding sphere of every object in the scene
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneBounds {
    pub center: Vec3,
    pub radius: f32,
}

pub struct Scene {
    pub camera: Camera,
    pub objects: Vec<Box<dyn Object>>,
    pub lights: Vec<Box<dyn Light>>,
    pub ambient: Vec3,
    pub settings: RenderSettings,
    bounds: SceneBounds,
}

impl Film {
    pub fn new(screen_width: u32, screen_height: u32) -> Self {
        Film {
            screen_width,
            screen_height,
            pixel_data: vec![Vec3::ZERO; screen_width as usize * screen_height as usize],
        }
    }

    /// Sets the pixel at column `x` and row `y`, counting rows from the bottom of the image
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Vec3) {
        let row = self.screen_height - 1 - y;
        self.pixel_data[row as usize * self.screen_width as usize + x as usize] = color;
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Vec3 {
        let row = self.screen_height - 1 - y;
        self.pixel_data[row as usize * self.screen_width as usize + x as usize]
    }
}

impl Camera {
    pub fn new(
        screen_width: u32,
        screen_height: u32,
        origin: Vec3,
        look_at: Vec3,
        up: Vec3,
        field_of_view: f32,
    ) -> Self {
        let world_width = 2.0;
        let world_height = world_width * (screen_height as f32) / (screen_width as f32);
        let focal_length = (field_of_view / 2.0).to_radians().tan().recip();

        let world_forwards = (look_at - origin).normalize();
        let world_right = world_forwards.cross(up).normalize();
        let world_up = world_right.cross(world_forwards).normalize();

        let world_u = world_right;
        let world_v = world_up;

        let world_position = origin
            + (-world_width * world_u / 2.0)
            + (-world_height * world_v / 2.0)
            + focal_length * world_forwards;

        Camera {
            screen_width,
            screen_height,
            world_origin: origin,
            world_width,
            world_height,
            world_position,
            world_u,
            world_v,
        }
    }

    /// Ray through pixel (x, y), with y counted from the bottom of the film. `offset` picks the
    /// point inside the pixel, (0.5, 0.5) being its center.
    pub fn ray(&self, x: u32, y: u32, offset: Vec2) -> Ray {
        let u = (x as f32 + offset.x) / self.screen_width as f32;
        let v = (y as f32 + offset.y) / self.screen_height as f32;
        let film_point = self.world_position
            + u * self.world_width * self.world_u
            + v * self.world_height * self.world_v;

        Ray::new(self.world_origin, film_point - self.world_origin)
    }

    pub fn film(&self) -> Film {
        Film::new(self.screen_width, self.screen_height)
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            samples_per_pixel: 1,
            max_ray_depth: 16,
            global_photons: 100,
            caustic_photons: 1000,
            nearest_photons: 50,
            max_photon_bounces: 32,
            seed: 0,
        }
    }
}

impl Default for SceneBounds {
    fn default() -> Self {
        SceneBounds {
            center: Vec3::ZERO,
            radius: 1.0,
        }
    }
}

impl SceneBounds {
    pub fn enclosing(objects: &[Box<dyn Object>]) -> Self {
        if objects.is_empty() {
            return SceneBounds::default();
        }

        let (min, max) = objects.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(min, max), object| {
                let (object_min, object_max) = object.bounds();
                (min.min(object_min), max.max(object_max))
            },
        );

        SceneBounds {
            center: (min + max) / 2.0,
            radius: ((max - min).length() / 2.0).max(f32::EPSILON),
        }
    }
}

impl Scene {
    pub fn new(
        camera: Camera,
        objects: Vec<Box<dyn Object>>,
        mut lights: Vec<Box<dyn Light>>,
        ambient: Vec3,
        settings: RenderSettings,
    ) -> Self {
        let bounds = SceneBounds::enclosing(&objects);
        for light in lights.iter_mut() {
            light.set_scene_bounds(&bounds);
        }

        Scene {
            camera,
            objects,
            lights,
            ambient,
            settings,
            bounds,
        }
    }

    pub fn bounds(&self) -> &SceneBounds {
        &self.bounds
    }

    pub fn brdf(&self, element: usize) -> &Brdf {
        self.objects[element].brdf()
    }

    /// Closest hit along the ray across every object
    pub fn intersect(&self, ray: &Ray) -> Option<Hit> {
        let mut closest: Option<Hit> = None;
        for (element, object) in self.objects.iter().enumerate() {
            let Some((distance, normal)) = object.intersect(ray) else {
                continue;
            };

            if closest.map_or(true, |hit| distance < hit.distance) {
                closest = Some(Hit {
                    distance,
                    point: ray.at(distance),
                    normal,
                    element,
                });
            }
        }

        closest
    }

    /// Whether a shadow ray from `origin` reaches `hit` without passing through anything else.
    /// Blockers that are the shaded element itself don't count.
    pub fn is_visible(&self, origin: Vec3, hit: &Hit) -> bool {
        let to_point = hit.point - origin;
        let distance = to_point.length();
        if distance <= SHADOW_EPSILON {
            return true;
        }

        match self.intersect(&Ray::new(origin, to_point)) {
            Some(blocker) => {
                blocker.element == hit.element || blocker.distance >= distance - SHADOW_EPSILON
            }
            None => true,
        }
    }
}
