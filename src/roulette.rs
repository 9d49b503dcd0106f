use glam::Vec3;

use crate::{
    objects::Brdf,
    sampling::{cosine_hemisphere, phong_lobe, reflect, refract, rotate_to, Sampler},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interaction {
    DiffuseReflection,
    SpecularReflection,
    Transmission,
    Absorption,
}

/// Per-component selection probabilities, normalized so they never sum past one
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Probabilities {
    pub diffuse: f32,
    pub specular: f32,
    pub transmission: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Outcome {
    pub interaction: Interaction,
    pub weight: Vec3,
}

impl Probabilities {
    pub const ABSORB: Probabilities = Probabilities {
        diffuse: 0.0,
        specular: 0.0,
        transmission: 0.0,
    };

    pub fn new(brdf: &Brdf, power: Vec3) -> Self {
        // Zero (or NaN) power can't be continued, so it is absorbed right away
        let max_power = power.max_element();
        if !(max_power > 0.0) {
            return Probabilities::ABSORB;
        }

        let component = |present: bool, reflectance: Vec3| {
            if present {
                (reflectance * power).max_element() / max_power
            } else {
                0.0
            }
        };

        let mut probabilities = Probabilities {
            diffuse: component(brdf.is_diffuse(), brdf.diffuse),
            specular: component(brdf.is_specular(), brdf.specular),
            transmission: component(brdf.is_transparent(), brdf.transmission),
        };

        let total = probabilities.total();
        if total > 1.0 {
            probabilities.diffuse /= total;
            probabilities.specular /= total;
            probabilities.transmission /= total;
        }

        probabilities
    }

    pub fn total(&self) -> f32 {
        self.diffuse + self.specular + self.transmission
    }

    /// Maps a uniform draw onto the consecutive [diffuse | specular | transmission | absorb] bands
    pub fn select(&self, k: f32) -> Interaction {
        if k < self.diffuse {
            Interaction::DiffuseReflection
        } else if k < self.diffuse + self.specular {
            Interaction::SpecularReflection
        } else if k < self.total() {
            Interaction::Transmission
        } else {
            Interaction::Absorption
        }
    }
}

/// Chooses what happens to light carrying `power` at a surface with the given BRDF. The returned
/// weight is the power after the interaction, already divided by the selection probability.
pub fn russian_roulette(brdf: &Brdf, power: Vec3, sampler: &mut dyn Sampler) -> Outcome {
    let probabilities = Probabilities::new(brdf, power);
    if probabilities.total() <= 0.0 {
        return Outcome {
            interaction: Interaction::Absorption,
            weight: Vec3::ZERO,
        };
    }

    let interaction = probabilities.select(sampler.next_uniform());
    let weight = match interaction {
        Interaction::DiffuseReflection => power * brdf.diffuse / probabilities.diffuse,
        Interaction::SpecularReflection => power * brdf.specular / probabilities.specular,
        Interaction::Transmission => power * brdf.transmission / probabilities.transmission,
        Interaction::Absorption => Vec3::ZERO,
    };

    Outcome {
        interaction,
        weight,
    }
}

/// Roulette for camera paths, which only carry the surface reflectance
pub fn sample_reflectance(brdf: &Brdf, sampler: &mut dyn Sampler) -> Outcome {
    russian_roulette(brdf, Vec3::ONE, sampler)
}

/// Samples the continuation direction for a chosen interaction. `normal` is the outward
/// geometric normal. Returns None when the branch ends: absorption, total internal reflection,
/// or a reflected sample that would leave below the surface.
pub fn continuation(
    interaction: Interaction,
    incoming: Vec3,
    normal: Vec3,
    brdf: &Brdf,
    sampler: &mut dyn Sampler,
) -> Option<Vec3> {
    let facing_normal = if normal.dot(incoming) > 0.0 {
        -normal
    } else {
        normal
    };

    match interaction {
        Interaction::DiffuseReflection => {
            let u1 = sampler.next_uniform();
            let u2 = sampler.next_uniform();
            Some(rotate_to(cosine_hemisphere(u1, u2), facing_normal))
        }
        Interaction::SpecularReflection => {
            let u1 = sampler.next_uniform();
            let u2 = sampler.next_uniform();
            let mirror = reflect(incoming.normalize(), facing_normal);
            let direction = rotate_to(phong_lobe(u1, u2, brdf.shininess), mirror);
            (direction.dot(facing_normal) > 0.0).then_some(direction)
        }
        Interaction::Transmission => refract(incoming, normal, brdf.index_of_refraction),
        Interaction::Absorption => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::tests::ScriptedSampler;
    use rand::{rngs::SmallRng, SeedableRng};

    fn glass() -> Brdf {
        Brdf {
            diffuse: Vec3::new(0.1, 0.1, 0.1),
            specular: Vec3::new(0.2, 0.3, 0.2),
            transmission: Vec3::new(0.7, 0.7, 0.9),
            index_of_refraction: 1.5,
            ..Brdf::default()
        }
    }

    #[test]
    fn test_black_brdf_always_absorbs() {
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..1000 {
            let outcome = russian_roulette(&Brdf::default(), Vec3::new(0.3, 0.5, 0.9), &mut rng);
            assert_eq!(outcome.interaction, Interaction::Absorption);
            assert_eq!(outcome.weight, Vec3::ZERO);
        }
    }

    #[test]
    fn test_zero_power_absorbs_without_dividing_by_zero() {
        let mut sampler = ScriptedSampler::new(&[0.0]);
        let outcome = russian_roulette(&glass(), Vec3::ZERO, &mut sampler);
        assert_eq!(outcome.interaction, Interaction::Absorption);
        assert!(outcome.weight.is_finite());
    }

    #[test]
    fn test_probabilities_are_normalized() {
        let brdfs = [
            glass(),
            Brdf::diffuse(Vec3::ONE),
            Brdf {
                diffuse: Vec3::ONE,
                specular: Vec3::ONE,
                transmission: Vec3::ONE,
                ..Brdf::default()
            },
            Brdf::mirror(Vec3::new(0.9, 0.0, 0.0), 50.0),
        ];
        let powers = [Vec3::ONE, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.01, 2.0, 0.5)];

        for brdf in &brdfs {
            for power in powers {
                let probabilities = Probabilities::new(brdf, power);
                assert!(probabilities.total() <= 1.0 + 1e-5);
                assert!(probabilities.diffuse >= 0.0);
                assert!(probabilities.specular >= 0.0);
                assert!(probabilities.transmission >= 0.0);
            }
        }
    }

    #[test]
    fn test_probabilities_follow_power_weighted_reflectance() {
        let probabilities = Probabilities::new(&glass(), Vec3::new(1.0, 0.5, 0.0));

        // Sum is 0.1 + 0.2 + 0.7 = 1.0, so nothing is renormalized
        assert!((probabilities.diffuse - 0.1).abs() < 1e-6);
        assert!((probabilities.specular - 0.2).abs() < 1e-6);
        assert!((probabilities.transmission - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_select_bands() {
        let probabilities = Probabilities {
            diffuse: 0.2,
            specular: 0.3,
            transmission: 0.1,
        };

        assert_eq!(probabilities.select(0.0), Interaction::DiffuseReflection);
        assert_eq!(probabilities.select(0.19), Interaction::DiffuseReflection);
        assert_eq!(probabilities.select(0.2), Interaction::SpecularReflection);
        assert_eq!(probabilities.select(0.49), Interaction::SpecularReflection);
        assert_eq!(probabilities.select(0.55), Interaction::Transmission);
        assert_eq!(probabilities.select(0.6), Interaction::Absorption);
        assert_eq!(probabilities.select(0.99), Interaction::Absorption);
    }

    #[test]
    fn test_weight_is_divided_by_selection_probability() {
        let brdf = Brdf::diffuse(Vec3::new(0.5, 0.25, 0.1));
        let mut sampler = ScriptedSampler::new(&[0.1]);
        let outcome = sample_reflectance(&brdf, &mut sampler);

        assert_eq!(outcome.interaction, Interaction::DiffuseReflection);
        assert!((outcome.weight - Vec3::new(1.0, 0.5, 0.2)).length() < 1e-5);
    }

    #[test]
    fn test_weights_stay_non_negative() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut power = Vec3::new(1.0, 0.8, 0.6);
        for _ in 0..200 {
            let outcome = russian_roulette(&glass(), power, &mut rng);
            assert!(outcome.weight.cmpge(Vec3::ZERO).all());
            if outcome.interaction == Interaction::Absorption {
                power = Vec3::new(1.0, 0.8, 0.6);
            } else {
                power = outcome.weight;
            }
        }
    }

    #[test]
    fn test_diffuse_only_never_selects_specular_or_transmission() {
        let brdf = Brdf::diffuse(Vec3::splat(0.6));
        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..2000 {
            let outcome = sample_reflectance(&brdf, &mut rng);
            assert!(matches!(
                outcome.interaction,
                Interaction::DiffuseReflection | Interaction::Absorption
            ));
        }
    }

    #[test]
    fn test_same_seed_reproduces_outcomes() {
        let run = |seed| {
            let mut rng = SmallRng::seed_from_u64(seed);
            (0..50)
                .map(|_| russian_roulette(&glass(), Vec3::new(0.4, 0.9, 0.2), &mut rng))
                .collect::<Vec<_>>()
        };

        assert_eq!(run(5), run(5));
    }

    #[test]
    fn test_transmission_beyond_critical_angle_ends_branch() {
        // A ray inside a glass slab hitting its top face at 80 degrees from the normal
        let angle = 80f32.to_radians();
        let incoming = Vec3::new(angle.sin(), angle.cos(), 0.0);
        let mut sampler = ScriptedSampler::new(&[0.5]);

        let direction = continuation(
            Interaction::Transmission,
            incoming,
            Vec3::Y,
            &glass(),
            &mut sampler,
        );
        assert!(direction.is_none());
    }

    #[test]
    fn test_continuation_leaves_on_the_incoming_side() {
        let brdf = Brdf::mirror(Vec3::ONE, 10.0);
        let incoming = Vec3::new(1.0, -1.0, 0.0).normalize();
        let mut rng = SmallRng::seed_from_u64(3);

        for interaction in [Interaction::DiffuseReflection, Interaction::SpecularReflection] {
            for _ in 0..100 {
                if let Some(direction) =
                    continuation(interaction, incoming, Vec3::Y, &brdf, &mut rng)
                {
                    assert!(direction.y > 0.0);
                }
            }
        }

        let mut sampler = ScriptedSampler::new(&[0.5]);
        assert!(
            continuation(Interaction::Absorption, incoming, Vec3::Y, &brdf, &mut sampler).is_none()
        );
    }
}
