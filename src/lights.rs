use glam::Vec3;

use crate::{
    objects::{Brdf, Ray},
    sampling::{cosine_hemisphere, rotate_to, uniform_cone, uniform_disk, uniform_sphere, Sampler},
    scene::SceneBounds,
};

/// Capabilities every light variant provides to the photon and path tracers
pub trait Light: Sync {
    fn color(&self) -> Vec3;
    fn intensity(&self) -> f32;

    /// Power shared out among the photons this light emits
    fn total_power(&self) -> Vec3 {
        self.color() * self.intensity()
    }

    fn set_scene_bounds(&mut self, _bounds: &SceneBounds) {}

    fn sample_emission_ray(&self, sampler: &mut dyn Sampler) -> Ray;

    /// Where a shadow ray towards `point` starts
    fn shadow_ray_origin(&self, point: Vec3) -> Vec3;

    /// Unit direction from `point` towards the light and the intensity arriving there
    fn illumination(&self, point: Vec3) -> Option<(Vec3, f32)>;

    /// Phong reflection of this light off a surface seen from `eye`
    fn reflection(&self, brdf: &Brdf, eye: Vec3, point: Vec3, normal: Vec3) -> Vec3 {
        let Some((to_light, intensity)) = self.illumination(point) else {
            return Vec3::ZERO;
        };

        let normal_dot_light = normal.dot(to_light);
        if normal_dot_light <= 0.0 || intensity <= 0.0 {
            return Vec3::ZERO;
        }

        let color = self.color();
        let mut reflection = intensity * normal_dot_light * brdf.diffuse * color;

        let reflected = 2.0 * normal_dot_light * normal - to_light;
        let view_dot_reflected = (eye - point).normalize_or_zero().dot(reflected);
        if view_dot_reflected > 0.0 {
            reflection +=
                intensity * view_dot_reflected.powf(brdf.shininess) * brdf.specular * color;
        }

        reflection
    }
}

/// Constant, linear and quadratic distance falloff
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

pub struct DirectionalLight {
    direction: Vec3,
    color: Vec3,
    intensity: f32,
    bounds: SceneBounds,
}

pub struct PointLight {
    position: Vec3,
    color: Vec3,
    intensity: f32,
    attenuation: Attenuation,
}

pub struct SpotLight {
    point: PointLight,
    direction: Vec3,
    cutoff_angle: f32,
    dropoff_rate: f32,
}

/// Light emitted from one side of a parallelogram
pub struct AreaLight {
    corner: Vec3,
    u: Vec3,
    v: Vec3,
    normal: Vec3,
    color: Vec3,
    intensity: f32,
    attenuation: Attenuation,
}

impl Default for Attenuation {
    fn default() -> Self {
        Attenuation {
            constant: 1.0,
            linear: 0.0,
            quadratic: 0.0,
        }
    }
}

impl Attenuation {
    pub fn new(constant: f32, linear: f32, quadratic: f32) -> Self {
        Attenuation {
            constant,
            linear,
            quadratic,
        }
    }

    pub fn scale(&self, distance: f32) -> f32 {
        let denominator = self.constant + self.linear * distance + self.quadratic * distance * distance;
        if denominator > 0.0 {
            denominator.recip()
        } else {
            1.0
        }
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        DirectionalLight {
            direction: direction.normalize(),
            color,
            intensity,
            bounds: SceneBounds::default(),
        }
    }
}

impl Light for DirectionalLight {
    fn color(&self) -> Vec3 {
        self.color
    }

    fn intensity(&self) -> f32 {
        self.intensity
    }

    fn set_scene_bounds(&mut self, bounds: &SceneBounds) {
        self.bounds = *bounds;
    }

    fn sample_emission_ray(&self, sampler: &mut dyn Sampler) -> Ray {
        // Photons start on a disk covering the scene, placed outside it against the light direction
        let disk_center = self.bounds.center - 1.25 * self.bounds.radius * self.direction;
        let u1 = sampler.next_uniform();
        let u2 = sampler.next_uniform();
        let offset = rotate_to(uniform_disk(u1, u2) * self.bounds.radius, self.direction);
        Ray::new(disk_center + offset, self.direction)
    }

    fn shadow_ray_origin(&self, point: Vec3) -> Vec3 {
        let distance = 2.0 * self.bounds.radius + (point - self.bounds.center).length();
        point - distance * self.direction
    }

    fn illumination(&self, _point: Vec3) -> Option<(Vec3, f32)> {
        Some((-self.direction, self.intensity))
    }
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3, intensity: f32, attenuation: Attenuation) -> Self {
        PointLight {
            position,
            color,
            intensity,
            attenuation,
        }
    }
}

impl Light for PointLight {
    fn color(&self) -> Vec3 {
        self.color
    }

    fn intensity(&self) -> f32 {
        self.intensity
    }

    fn sample_emission_ray(&self, sampler: &mut dyn Sampler) -> Ray {
        let u1 = sampler.next_uniform();
        let u2 = sampler.next_uniform();
        Ray::new(self.position, uniform_sphere(u1, u2))
    }

    fn shadow_ray_origin(&self, _point: Vec3) -> Vec3 {
        self.position
    }

    fn illumination(&self, point: Vec3) -> Option<(Vec3, f32)> {
        let to_light = self.position - point;
        let distance = to_light.length();
        if distance <= 0.0 {
            return None;
        }

        Some((
            to_light / distance,
            self.intensity * self.attenuation.scale(distance),
        ))
    }
}

impl SpotLight {
    pub fn new(
        point: PointLight,
        direction: Vec3,
        cutoff_angle: f32,
        dropoff_rate: f32,
    ) -> Self {
        SpotLight {
            point,
            direction: direction.normalize(),
            cutoff_angle,
            dropoff_rate,
        }
    }
}

impl Light for SpotLight {
    fn color(&self) -> Vec3 {
        self.point.color
    }

    fn intensity(&self) -> f32 {
        self.point.intensity
    }

    fn sample_emission_ray(&self, sampler: &mut dyn Sampler) -> Ray {
        let u1 = sampler.next_uniform();
        let u2 = sampler.next_uniform();
        let direction = rotate_to(uniform_cone(u1, u2, self.cutoff_angle), self.direction);
        Ray::new(self.point.position, direction)
    }

    fn shadow_ray_origin(&self, _point: Vec3) -> Vec3 {
        self.point.position
    }

    fn illumination(&self, point: Vec3) -> Option<(Vec3, f32)> {
        let (to_light, intensity) = self.point.illumination(point)?;

        let cos_alpha = (-to_light).dot(self.direction);
        if cos_alpha < self.cutoff_angle.cos() {
            return Some((to_light, 0.0));
        }

        Some((to_light, intensity * cos_alpha.max(0.0).powf(self.dropoff_rate)))
    }
}

impl AreaLight {
    pub fn new(
        corner: Vec3,
        u: Vec3,
        v: Vec3,
        color: Vec3,
        intensity: f32,
        attenuation: Attenuation,
    ) -> Self {
        AreaLight {
            corner,
            u,
            v,
            normal: u.cross(v).normalize(),
            color,
            intensity,
            attenuation,
        }
    }

    fn center(&self) -> Vec3 {
        self.corner + 0.5 * (self.u + self.v)
    }
}

impl Light for AreaLight {
    fn color(&self) -> Vec3 {
        self.color
    }

    fn intensity(&self) -> f32 {
        self.intensity
    }

    fn sample_emission_ray(&self, sampler: &mut dyn Sampler) -> Ray {
        let origin = self.corner + sampler.next_uniform() * self.u + sampler.next_uniform() * self.v;
        let u1 = sampler.next_uniform();
        let u2 = sampler.next_uniform();
        Ray::new(origin, rotate_to(cosine_hemisphere(u1, u2), self.normal))
    }

    fn shadow_ray_origin(&self, _point: Vec3) -> Vec3 {
        self.center()
    }

    fn illumination(&self, point: Vec3) -> Option<(Vec3, f32)> {
        let to_light = self.center() - point;
        let distance = to_light.length();
        if distance <= 0.0 {
            return None;
        }

        let to_light = to_light / distance;
        let cos_emission = (-to_light).dot(self.normal).max(0.0);
        Some((
            to_light,
            self.intensity * cos_emission * self.attenuation.scale(distance),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    fn assert_close(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-4, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_directional_emission_starts_outside_scene() {
        let mut light = DirectionalLight::new(-Vec3::Y, Vec3::ONE, 1.0);
        let bounds = SceneBounds {
            center: Vec3::ZERO,
            radius: 2.0,
        };
        light.set_scene_bounds(&bounds);

        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..100 {
            let ray = light.sample_emission_ray(&mut rng);
            assert_close(ray.direction, -Vec3::Y);
            assert!((ray.origin.y - 2.5).abs() < 1e-4);
            assert!(Vec3::new(ray.origin.x, 0.0, ray.origin.z).length() <= 2.0 + 1e-4);
        }

        let origin = light.shadow_ray_origin(Vec3::new(1.0, 0.0, 0.0));
        assert!(origin.y > bounds.radius);
        assert!((origin.x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_directional_reflection_is_phong() {
        let light = DirectionalLight::new(-Vec3::Y, Vec3::new(1.0, 0.5, 0.5), 2.0);
        let brdf = Brdf {
            diffuse: Vec3::splat(0.5),
            specular: Vec3::splat(0.25),
            shininess: 10.0,
            ..Brdf::default()
        };

        // Eye on the mirror direction gets the full highlight
        let eye = Vec3::new(0.0, 5.0, 0.0);
        let reflection = light.reflection(&brdf, eye, Vec3::ZERO, Vec3::Y);
        let expected = 2.0 * Vec3::new(1.0, 0.5, 0.5) * (0.5 + 0.25);
        assert_close(reflection, expected);

        // Lit from behind
        let reflection = light.reflection(&brdf, eye, Vec3::ZERO, -Vec3::Y);
        assert_eq!(reflection, Vec3::ZERO);
    }

    #[test]
    fn test_point_light_attenuates_with_distance() {
        let light = PointLight::new(
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::ONE,
            1.0,
            Attenuation::new(0.0, 0.0, 1.0),
        );

        let (to_light, intensity) = light.illumination(Vec3::ZERO).unwrap();
        assert_close(to_light, Vec3::Y);
        assert!((intensity - 0.25).abs() < 1e-5);
        assert_close(light.shadow_ray_origin(Vec3::ZERO), Vec3::new(0.0, 2.0, 0.0));

        let mut rng = SmallRng::seed_from_u64(2);
        let ray = light.sample_emission_ray(&mut rng);
        assert_close(ray.origin, Vec3::new(0.0, 2.0, 0.0));
        assert!((ray.direction.length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_spot_light_cone() {
        let spot = SpotLight::new(
            PointLight::new(Vec3::new(0.0, 1.0, 0.0), Vec3::ONE, 1.0, Attenuation::default()),
            -Vec3::Y,
            30f32.to_radians(),
            1.0,
        );

        let (_, inside) = spot.illumination(Vec3::ZERO).unwrap();
        assert!((inside - 1.0).abs() < 1e-5);

        let (_, outside) = spot.illumination(Vec3::new(5.0, 0.0, 0.0)).unwrap();
        assert_eq!(outside, 0.0);

        let mut rng = SmallRng::seed_from_u64(4);
        for _ in 0..200 {
            let ray = spot.sample_emission_ray(&mut rng);
            assert!(ray.direction.dot(-Vec3::Y) >= 30f32.to_radians().cos() - 1e-4);
        }
    }

    #[test]
    fn test_area_light_emits_from_its_front_face() {
        let light = AreaLight::new(
            Vec3::new(-0.5, 2.0, -0.5),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::ONE,
            3.0,
            Attenuation::default(),
        );

        // u x v = -Y, so the light faces down
        let mut rng = SmallRng::seed_from_u64(8);
        for _ in 0..200 {
            let ray = light.sample_emission_ray(&mut rng);
            assert!(ray.direction.y <= 1e-4);
            assert!((ray.origin.y - 2.0).abs() < 1e-4);
            assert!(ray.origin.x.abs() <= 0.5 + 1e-4 && ray.origin.z.abs() <= 0.5 + 1e-4);
        }

        let (_, below) = light.illumination(Vec3::ZERO).unwrap();
        assert!((below - 3.0).abs() < 1e-4);
        let (_, above) = light.illumination(Vec3::new(0.0, 4.0, 0.0)).unwrap();
        assert_eq!(above, 0.0);
        assert_close(light.total_power(), Vec3::splat(3.0));
    }
}
