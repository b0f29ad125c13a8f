use gms_random::DeterministicRng;

use crate::traits::{Manifold, RiemannianMetric};
use crate::{GeometryError, axpy, dot, norm};

const SMALL_ANGLE: f64 = 1e-12;

/// Unit sphere `S^dim` embedded in `R^(dim + 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hypersphere {
    dim: usize,
}

impl Hypersphere {
    pub fn new(dim: usize) -> Result<Self, GeometryError> {
        if dim == 0 {
            return Err(GeometryError::InvalidParameter("hypersphere dim must be positive"));
        }
        Ok(Self { dim })
    }

    #[must_use]
    pub fn metric(self) -> HypersphereMetric {
        HypersphereMetric { space: self }
    }

    fn ambient_dim(&self) -> usize {
        self.dim + 1
    }
}

impl Manifold for Hypersphere {
    fn name(&self) -> &'static str {
        "hypersphere"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn point_shape(&self) -> Vec<usize> {
        vec![self.ambient_dim()]
    }

    fn belongs_point(&self, point: &[f64], atol: f64) -> bool {
        point.len() == self.ambient_dim() && (dot(point, point) - 1.0).abs() <= atol
    }

    fn random_point_with(
        &self,
        rng: &mut DeterministicRng,
        _bound: f64,
    ) -> Result<Vec<f64>, GeometryError> {
        loop {
            let draw = rng.normal_vec(self.ambient_dim());
            let length = norm(&draw);
            if length > SMALL_ANGLE {
                return Ok(draw.into_iter().map(|x| x / length).collect());
            }
        }
    }

    fn projection_point(&self, point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        if point.len() != self.ambient_dim() {
            return Err(GeometryError::NotOnManifold(
                "point length differs from the ambient dimension",
            ));
        }
        let length = norm(point);
        if length <= SMALL_ANGLE || !length.is_finite() {
            return Err(GeometryError::NotOnManifold(
                "cannot project the origin onto the sphere",
            ));
        }
        Ok(point.iter().map(|x| x / length).collect())
    }

    fn to_tangent_point(
        &self,
        vector: &[f64],
        base_point: &[f64],
    ) -> Result<Vec<f64>, GeometryError> {
        if vector.len() != self.ambient_dim() || base_point.len() != self.ambient_dim() {
            return Err(GeometryError::NotOnManifold(
                "vector length differs from the ambient dimension",
            ));
        }
        let normal = dot(vector, base_point) / dot(base_point, base_point);
        Ok(axpy(-normal, base_point, vector))
    }

    fn is_tangent_point(&self, vector: &[f64], base_point: &[f64], atol: f64) -> bool {
        vector.len() == self.ambient_dim() && dot(vector, base_point).abs() <= atol
    }
}

/// Round metric induced by the embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HypersphereMetric {
    space: Hypersphere,
}

impl RiemannianMetric for HypersphereMetric {
    fn space(&self) -> &dyn Manifold {
        &self.space
    }

    fn inner_product_at(
        &self,
        tangent_a: &[f64],
        tangent_b: &[f64],
        _base_point: &[f64],
    ) -> Result<f64, GeometryError> {
        Ok(dot(tangent_a, tangent_b))
    }

    fn exp_at(&self, tangent_vec: &[f64], base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        let theta = norm(tangent_vec);
        if theta < SMALL_ANGLE {
            let moved = axpy(1.0, tangent_vec, base_point);
            return self.space.projection_point(&moved);
        }
        let (sin, cos) = theta.sin_cos();
        Ok(base_point
            .iter()
            .zip(tangent_vec)
            .map(|(p, v)| cos * p + sin * v / theta)
            .collect())
    }

    fn log_at(&self, point: &[f64], base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        let cos = dot(point, base_point);
        let direction = axpy(-cos, base_point, point);
        let sin = norm(&direction);
        if sin < SMALL_ANGLE {
            if cos > 0.0 {
                return Ok(vec![0.0; base_point.len()]);
            }
            return Err(GeometryError::CutLocus);
        }
        let theta = sin.atan2(cos);
        Ok(direction.into_iter().map(|d| theta * d / sin).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::Hypersphere;
    use crate::GeometryError;
    use crate::traits::{Manifold, RiemannianMetric};
    use gms_array::{Array, all_close};
    use gms_random::DeterministicRng;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn quarter_turn_from_the_north_pole() {
        let metric = Hypersphere::new(2).expect("dim").metric();
        let north = Array::vector(vec![0.0, 0.0, 1.0]);
        let v = Array::vector(vec![FRAC_PI_2, 0.0, 0.0]);
        let q = metric.exp(&v, &north).expect("exp");
        assert!(all_close(&Array::vector(vec![1.0, 0.0, 0.0]), &q, 1e-12, 0.0));
        let back = metric.log(&q, &north).expect("log");
        assert!(all_close(&v, &back, 1e-12, 0.0));
    }

    #[test]
    fn log_of_coincident_points_is_zero() {
        let metric = Hypersphere::new(2).expect("dim").metric();
        let p = Array::vector(vec![0.0, 1.0, 0.0]);
        assert_eq!(metric.log(&p, &p).expect("log").values(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn antipodal_log_is_rejected() {
        let metric = Hypersphere::new(2).expect("dim").metric();
        let north = Array::vector(vec![0.0, 0.0, 1.0]);
        let south = Array::vector(vec![0.0, 0.0, -1.0]);
        assert_eq!(metric.log(&south, &north), Err(GeometryError::CutLocus));
    }

    #[test]
    fn random_tangent_vectors_are_tangent() {
        let space = Hypersphere::new(3).expect("dim");
        let mut rng = DeterministicRng::new(11);
        let base = space.random_point(5, &mut rng).expect("points");
        assert_eq!(space.belongs(&base, 1e-12), vec![true; 5]);
        let vecs = space
            .random_tangent_vec(&base, 5, &mut rng, 1.0)
            .expect("tangent");
        assert_eq!(
            space.is_tangent(&vecs, &base, 1e-12).expect("check"),
            vec![true; 5]
        );
    }

    #[test]
    fn projection_normalises_and_rejects_origin() {
        let space = Hypersphere::new(1).expect("dim");
        let projected = space
            .projection(&Array::vector(vec![3.0, 4.0]))
            .expect("projection");
        assert!(all_close(&Array::vector(vec![0.6, 0.8]), &projected, 1e-15, 0.0));
        assert!(space.projection(&Array::vector(vec![0.0, 0.0])).is_err());
    }
}
