//! Ordered sets of `k` landmarks on an ambient manifold, with the product
//! (L2) metric.

use std::sync::Arc;

use gms_random::DeterministicRng;

use crate::GeometryError;
use crate::traits::{Manifold, RiemannianMetric};

#[derive(Debug, Clone)]
pub struct Landmarks {
    ambient: Arc<dyn RiemannianMetric>,
    k_landmarks: usize,
    landmark_len: usize,
}

impl Landmarks {
    pub fn new(
        ambient: Arc<dyn RiemannianMetric>,
        k_landmarks: usize,
    ) -> Result<Self, GeometryError> {
        if k_landmarks == 0 {
            return Err(GeometryError::InvalidParameter(
                "a landmark set needs at least one landmark",
            ));
        }
        let ambient_shape = ambient.space().point_shape();
        let [landmark_len] = ambient_shape[..] else {
            return Err(GeometryError::InvalidParameter(
                "landmarks need an ambient space of vectors",
            ));
        };
        Ok(Self {
            ambient,
            k_landmarks,
            landmark_len,
        })
    }

    #[must_use]
    pub fn k_landmarks(&self) -> usize {
        self.k_landmarks
    }

    #[must_use]
    pub fn metric(&self) -> L2Metric {
        L2Metric {
            space: self.clone(),
        }
    }

    fn landmarks<'a>(&self, set: &'a [f64]) -> Result<std::slice::Chunks<'a, f64>, GeometryError> {
        if set.len() != self.k_landmarks * self.landmark_len {
            return Err(GeometryError::NotOnManifold(
                "landmark set has the wrong number of coordinates",
            ));
        }
        Ok(set.chunks(self.landmark_len))
    }

    fn map_landmarks(
        &self,
        lhs: &[f64],
        rhs: &[f64],
        mut f: impl FnMut(&[f64], &[f64]) -> Result<Vec<f64>, GeometryError>,
    ) -> Result<Vec<f64>, GeometryError> {
        let mut out = Vec::with_capacity(lhs.len());
        for (a, b) in self.landmarks(lhs)?.zip(self.landmarks(rhs)?) {
            out.extend(f(a, b)?);
        }
        Ok(out)
    }
}

impl Manifold for Landmarks {
    fn name(&self) -> &'static str {
        "landmarks"
    }

    fn dim(&self) -> usize {
        self.k_landmarks * self.ambient.space().dim()
    }

    fn point_shape(&self) -> Vec<usize> {
        vec![self.k_landmarks, self.landmark_len]
    }

    fn default_bound(&self) -> f64 {
        self.ambient.space().default_bound()
    }

    fn belongs_point(&self, point: &[f64], atol: f64) -> bool {
        let ambient = self.ambient.space();
        self.landmarks(point)
            .is_ok_and(|mut chunks| chunks.all(|landmark| ambient.belongs_point(landmark, atol)))
    }

    fn random_point_with(
        &self,
        rng: &mut DeterministicRng,
        bound: f64,
    ) -> Result<Vec<f64>, GeometryError> {
        let ambient = self.ambient.space();
        let mut out = Vec::with_capacity(self.k_landmarks * self.landmark_len);
        for _ in 0..self.k_landmarks {
            out.extend(ambient.random_point_with(rng, bound)?);
        }
        Ok(out)
    }

    fn projection_point(&self, point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        let ambient = self.ambient.space();
        let mut out = Vec::with_capacity(point.len());
        for landmark in self.landmarks(point)? {
            out.extend(ambient.projection_point(landmark)?);
        }
        Ok(out)
    }

    fn to_tangent_point(
        &self,
        vector: &[f64],
        base_point: &[f64],
    ) -> Result<Vec<f64>, GeometryError> {
        let ambient = self.ambient.space();
        self.map_landmarks(vector, base_point, |v, p| ambient.to_tangent_point(v, p))
    }

    fn is_tangent_point(&self, vector: &[f64], base_point: &[f64], atol: f64) -> bool {
        let ambient = self.ambient.space();
        match (self.landmarks(vector), self.landmarks(base_point)) {
            (Ok(vectors), Ok(bases)) => vectors
                .zip(bases)
                .all(|(v, p)| ambient.is_tangent_point(v, p, atol)),
            _ => false,
        }
    }

    fn random_tangent_vec_at(
        &self,
        base_point: &[f64],
        rng: &mut DeterministicRng,
        scale: f64,
    ) -> Result<Vec<f64>, GeometryError> {
        let ambient = self.ambient.space();
        let mut out = Vec::with_capacity(base_point.len());
        for landmark in self.landmarks(base_point)? {
            out.extend(ambient.random_tangent_vec_at(landmark, rng, scale)?);
        }
        Ok(out)
    }
}

/// Sum of the ambient metric over landmarks.
#[derive(Debug, Clone)]
pub struct L2Metric {
    space: Landmarks,
}

impl L2Metric {
    #[must_use]
    pub fn landmarks(&self) -> &Landmarks {
        &self.space
    }
}

impl RiemannianMetric for L2Metric {
    fn space(&self) -> &dyn Manifold {
        &self.space
    }

    fn inner_product_at(
        &self,
        tangent_a: &[f64],
        tangent_b: &[f64],
        base_point: &[f64],
    ) -> Result<f64, GeometryError> {
        let space = &self.space;
        let mut acc = 0.0;
        for ((a, b), p) in space
            .landmarks(tangent_a)?
            .zip(space.landmarks(tangent_b)?)
            .zip(space.landmarks(base_point)?)
        {
            acc += space.ambient.inner_product_at(a, b, p)?;
        }
        Ok(acc)
    }

    fn exp_at(&self, tangent_vec: &[f64], base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        let ambient = &self.space.ambient;
        self.space
            .map_landmarks(tangent_vec, base_point, |v, p| ambient.exp_at(v, p))
    }

    fn log_at(&self, point: &[f64], base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        let ambient = &self.space.ambient;
        self.space
            .map_landmarks(point, base_point, |q, p| ambient.log_at(q, p))
    }
}
