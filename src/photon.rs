use std::{
    cmp::Ordering,
    error::Error,
    f32::consts::PI,
    fmt::Display,
};

use glam::Vec3;
use kd_tree::{KdPoint, KdTree};

use crate::{objects::Ray, roulette::Interaction};

/// Whether a light path has already bounced specularly or through a transmissive surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathHistory {
    NoSpecularYet,
    HadSpecularOrTransmissive,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Photon {
    pub position: Vec3,
    pub incident_direction: Vec3,
    pub power: Vec3,
    pub history: PathHistory,
}

/// Append-only photon storage used while tracing a pass
#[derive(Default)]
pub struct PhotonStore {
    photons: Vec<Photon>,
}

/// Read-only photon map with a nearest-neighbor index, produced by `PhotonStore::build`
pub struct PhotonMap {
    tree: Option<KdTree<Photon>>,
}

#[derive(Debug)]
pub struct EmptyMapError;

impl PathHistory {
    pub fn after(self, interaction: Interaction) -> Self {
        match interaction {
            Interaction::SpecularReflection | Interaction::Transmission => {
                PathHistory::HadSpecularOrTransmissive
            }
            _ => self,
        }
    }
}

impl Photon {
    pub fn ray(&self) -> Ray {
        Ray::new(self.position, self.incident_direction)
    }
}

impl KdPoint for Photon {
    type Scalar = f32;
    type Dim = typenum::U3;

    fn at(&self, k: usize) -> f32 {
        self.position[k]
    }
}

impl Display for EmptyMapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "photon map has no photons to index")
    }
}

impl Error for EmptyMapError {}

impl PhotonStore {
    pub fn new() -> Self {
        PhotonStore::default()
    }

    pub fn insert(&mut self, photon: Photon) {
        self.photons.push(photon);
    }

    pub fn len(&self) -> usize {
        self.photons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photons.is_empty()
    }

    #[cfg(test)]
    pub fn photons(&self) -> &[Photon] {
        &self.photons
    }

    /// Consumes the store and indexes it. No photons can be added afterwards.
    pub fn build(self) -> Result<PhotonMap, EmptyMapError> {
        if self.is_empty() {
            return Err(EmptyMapError);
        }

        let tree = KdTree::build_by(self.photons, |a, b, k| {
            a.position[k]
                .partial_cmp(&b.position[k])
                .unwrap_or(Ordering::Equal)
        });

        Ok(PhotonMap { tree: Some(tree) })
    }
}

impl PhotonMap {
    /// A map that contributes nothing, standing in for a pass that stored no photons
    pub fn empty() -> Self {
        PhotonMap { tree: None }
    }

    pub fn len(&self) -> usize {
        self.tree.as_ref().map_or(0, |tree| tree.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `k` photons closest to `point` with their distances, nearest first
    pub fn k_nearest(&self, point: Vec3, k: usize) -> Vec<(&Photon, f32)> {
        let Some(tree) = &self.tree else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let wanted = k.min(tree.len());
        let mut nearest: Vec<(&Photon, f32)> = if k >= tree.len() {
            Vec::new()
        } else {
            tree.nearests(&point.to_array(), k)
                .into_iter()
                .map(|found| (found.item, found.squared_distance.sqrt()))
                .collect()
        };

        // The index skips branches whose split plane ties the current worst distance
        if nearest.len() < wanted {
            nearest = tree
                .iter()
                .map(|photon| (photon, photon.position.distance(point)))
                .collect();
        }

        nearest.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        nearest.truncate(wanted);
        nearest
    }

    /// Disk-area density estimate: summed power of the `k` nearest photons over the area of the
    /// disk reaching the farthest of them
    pub fn estimate(&self, point: Vec3, k: usize) -> Vec3 {
        let nearest = self.k_nearest(point, k);
        let Some((_, max_distance)) = nearest.last() else {
            return Vec3::ZERO;
        };

        let area = PI * max_distance * max_distance;
        if area <= f32::EPSILON {
            return Vec3::ZERO;
        }

        nearest.iter().map(|(photon, _)| photon.power).sum::<Vec3>() / area
    }
}
