use glam::Vec3;

pub const FLOAT_ERROR: f32 = 0.0001;

/// Distance rays leaving a surface are pushed off it
const SURFACE_OFFSET: f32 = 10.0 * FLOAT_ERROR;

pub trait Object: Sync {
    /// Returns the distance along the ray and the outward geometric normal of the closest hit
    fn intersect(&self, ray: &Ray) -> Option<(f32, Vec3)>;
    fn bounds(&self) -> (Vec3, Vec3);
    fn brdf(&self) -> &Brdf;
}

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// A surface hit reported by the scene. `element` is the index of the object that was hit.
#[derive(Clone, Copy, Debug)]
pub struct Hit {
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub element: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Brdf {
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub transmission: Vec3,
    pub emission: Vec3,
    pub shininess: f32,
    pub index_of_refraction: f32,
}

pub struct Sphere {
    center: Vec3,
    radius: f32,
    brdf: Brdf,
}

pub struct Triangle {
    point1: Vec3,
    point2: Vec3,
    point3: Vec3,
    brdf: Brdf,
}

/// Parallelogram spanned by the edges `u` and `v` from `corner`
pub struct Quad {
    corner: Vec3,
    u: Vec3,
    v: Vec3,
    normal: Vec3,
    brdf: Brdf,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Ray {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + distance * self.direction
    }
}

impl Hit {
    /// Geometric normal flipped to face against the incoming direction
    pub fn facing_normal(&self, incoming: Vec3) -> Vec3 {
        if self.normal.dot(incoming) > 0.0 {
            -self.normal
        } else {
            self.normal
        }
    }

    /// Ray leaving the hit point, nudged off the surface on the side it travels towards
    pub fn spawn_ray(&self, direction: Vec3) -> Ray {
        let side = if direction.dot(self.normal) >= 0.0 {
            self.normal
        } else {
            -self.normal
        };

        Ray::new(self.point + SURFACE_OFFSET * side, direction)
    }
}

impl Default for Brdf {
    fn default() -> Self {
        Brdf {
            diffuse: Vec3::ZERO,
            specular: Vec3::ZERO,
            transmission: Vec3::ZERO,
            emission: Vec3::ZERO,
            shininess: 1.0,
            index_of_refraction: 1.0,
        }
    }
}

impl Brdf {
    #[cfg(test)]
    pub fn diffuse(reflectance: Vec3) -> Self {
        Brdf {
            diffuse: reflectance,
            ..Brdf::default()
        }
    }

    #[cfg(test)]
    pub fn mirror(reflectance: Vec3, shininess: f32) -> Self {
        Brdf {
            specular: reflectance,
            shininess,
            ..Brdf::default()
        }
    }

    pub fn is_diffuse(&self) -> bool {
        self.diffuse.cmpne(Vec3::ZERO).any()
    }

    pub fn is_specular(&self) -> bool {
        self.specular.cmpne(Vec3::ZERO).any()
    }

    pub fn is_transparent(&self) -> bool {
        self.transmission.cmpne(Vec3::ZERO).any()
    }
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32, brdf: Brdf) -> Self {
        Sphere {
            center,
            radius,
            brdf,
        }
    }
}

impl Object for Sphere {
    fn intersect(&self, ray: &Ray) -> Option<(f32, Vec3)> {
        let center_to_origin = ray.origin - self.center;
        let b = ray.direction.dot(center_to_origin);
        let c = center_to_origin.length_squared() - self.radius * self.radius;
        let discriminant = b * b - c;

        if discriminant < 0.0 {
            return None;
        }

        // Origins inside the sphere fall through to the far root
        let sqrt_discriminant = discriminant.sqrt();
        let hit_distance = if -b - sqrt_discriminant > FLOAT_ERROR {
            -b - sqrt_discriminant
        } else if -b + sqrt_discriminant > FLOAT_ERROR {
            -b + sqrt_discriminant
        } else {
            return None;
        };

        Some((
            hit_distance,
            (ray.at(hit_distance) - self.center).normalize(),
        ))
    }

    fn bounds(&self) -> (Vec3, Vec3) {
        (
            self.center - Vec3::splat(self.radius),
            self.center + Vec3::splat(self.radius),
        )
    }

    fn brdf(&self) -> &Brdf {
        &self.brdf
    }
}

impl Triangle {
    pub fn new(point1: Vec3, point2: Vec3, point3: Vec3, brdf: Brdf) -> Self {
        Triangle {
            point1,
            point2,
            point3,
            brdf,
        }
    }
}

impl Object for Triangle {
    fn intersect(&self, ray: &Ray) -> Option<(f32, Vec3)> {
        intersect_triangle(ray, self.point1, self.point2, self.point3)
    }

    fn bounds(&self) -> (Vec3, Vec3) {
        (
            self.point1.min(self.point2.min(self.point3)),
            self.point1.max(self.point2.max(self.point3)),
        )
    }

    fn brdf(&self) -> &Brdf {
        &self.brdf
    }
}

impl Quad {
    pub fn new(corner: Vec3, u: Vec3, v: Vec3, brdf: Brdf) -> Self {
        Quad {
            corner,
            u,
            v,
            normal: u.cross(v).normalize(),
            brdf,
        }
    }
}

impl Object for Quad {
    fn intersect(&self, ray: &Ray) -> Option<(f32, Vec3)> {
        intersect_parallelogram(ray, self.corner, self.u, self.v)
            .map(|distance| (distance, self.normal))
    }

    fn bounds(&self) -> (Vec3, Vec3) {
        let corners = [
            self.corner,
            self.corner + self.u,
            self.corner + self.v,
            self.corner + self.u + self.v,
        ];

        corners.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(min, max), corner| (min.min(*corner), max.max(*corner)),
        )
    }

    fn brdf(&self) -> &Brdf {
        &self.brdf
    }
}

fn intersect_triangle(ray: &Ray, p1: Vec3, p2: Vec3, p3: Vec3) -> Option<(f32, Vec3)> {
    let side1 = p2 - p1;
    let side2 = p3 - p1;

    let ray_cross_side2 = ray.direction.cross(side2);
    let denominator = side1.dot(ray_cross_side2);
    if denominator.abs() < FLOAT_ERROR {
        return None;
    }

    let fraction = denominator.recip();
    let p1_to_origin = ray.origin - p1;
    let u = fraction * p1_to_origin.dot(ray_cross_side2);
    if u < 0.0 {
        return None;
    }

    let p1_to_origin_cross_side1 = p1_to_origin.cross(side1);
    let v = fraction * ray.direction.dot(p1_to_origin_cross_side1);
    let hit_distance = fraction * side2.dot(p1_to_origin_cross_side1);
    let normal = side1.cross(side2).normalize();

    if v < 0.0 || u + v > 1.0 || hit_distance < FLOAT_ERROR {
        None
    } else {
        Some((hit_distance, normal))
    }
}

/// Distance to the parallelogram `corner + a * u + b * v` with `a, b` in [0, 1]
pub fn intersect_parallelogram(ray: &Ray, corner: Vec3, u: Vec3, v: Vec3) -> Option<f32> {
    let plane_normal = u.cross(v);
    let denominator = plane_normal.dot(ray.direction);
    if denominator.abs() < FLOAT_ERROR * FLOAT_ERROR {
        return None;
    }

    let hit_distance = plane_normal.dot(corner - ray.origin) / denominator;
    if hit_distance < FLOAT_ERROR {
        return None;
    }

    let w = plane_normal / plane_normal.length_squared();
    let corner_to_hit = ray.at(hit_distance) - corner;
    let a = w.dot(corner_to_hit.cross(v));
    let b = w.dot(u.cross(corner_to_hit));

    if (0.0..=1.0).contains(&a) && (0.0..=1.0).contains(&b) {
        Some(hit_distance)
    } else {
        None
    }
}
