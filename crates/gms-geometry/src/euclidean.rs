use gms_random::DeterministicRng;

use crate::traits::{Manifold, RiemannianMetric};
use crate::{GeometryError, dot};

/// Flat `R^dim`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Euclidean {
    dim: usize,
}

impl Euclidean {
    pub fn new(dim: usize) -> Result<Self, GeometryError> {
        if dim == 0 {
            return Err(GeometryError::InvalidParameter("euclidean dim must be positive"));
        }
        Ok(Self { dim })
    }

    #[must_use]
    pub fn metric(self) -> EuclideanMetric {
        EuclideanMetric { space: self }
    }

    fn check_len(&self, values: &[f64]) -> Result<(), GeometryError> {
        if values.len() == self.dim {
            Ok(())
        } else {
            Err(GeometryError::NotOnManifold(
                "vector length differs from euclidean dim",
            ))
        }
    }
}

impl Manifold for Euclidean {
    fn name(&self) -> &'static str {
        "euclidean"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn point_shape(&self) -> Vec<usize> {
        vec![self.dim]
    }

    fn belongs_point(&self, point: &[f64], _atol: f64) -> bool {
        point.len() == self.dim && point.iter().all(|x| x.is_finite())
    }

    fn random_point_with(
        &self,
        rng: &mut DeterministicRng,
        bound: f64,
    ) -> Result<Vec<f64>, GeometryError> {
        Ok(rng.uniform_vec(-bound, bound, self.dim))
    }

    fn projection_point(&self, point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        self.check_len(point)?;
        Ok(point.to_vec())
    }

    fn to_tangent_point(
        &self,
        vector: &[f64],
        base_point: &[f64],
    ) -> Result<Vec<f64>, GeometryError> {
        self.check_len(vector)?;
        self.check_len(base_point)?;
        Ok(vector.to_vec())
    }

    fn is_tangent_point(&self, vector: &[f64], _base_point: &[f64], _atol: f64) -> bool {
        self.belongs_point(vector, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EuclideanMetric {
    space: Euclidean,
}

impl RiemannianMetric for EuclideanMetric {
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
        Ok(base_point
            .iter()
            .zip(tangent_vec)
            .map(|(p, v)| p + v)
            .collect())
    }

    fn log_at(&self, point: &[f64], base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        Ok(point.iter().zip(base_point).map(|(q, p)| q - p).collect())
    }

    fn metric_matrix_at(&self, _base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        let n = self.space.dim;
        Ok((0..n * n)
            .map(|idx| if idx / n == idx % n { 1.0 } else { 0.0 })
            .collect())
    }

    fn christoffels_at(&self, _base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        Ok(vec![0.0; self.space.dim.pow(3)])
    }
}

#[cfg(test)]
mod tests {
    use super::Euclidean;
    use crate::traits::{Manifold, RiemannianMetric};
    use gms_array::Array;
    use gms_random::DeterministicRng;

    #[test]
    fn random_points_respect_bound_and_shape() {
        let space = Euclidean::new(3).expect("dim");
        let mut rng = DeterministicRng::new(3);
        let points = space
            .random_point_bounded(4, &mut rng, 2.0)
            .expect("points");
        assert_eq!(points.shape(), &[4, 3]);
        assert!(points.values().iter().all(|x| x.abs() <= 2.0));
        assert_eq!(space.belongs(&points, 0.0), vec![true; 4]);
    }

    #[test]
    fn exp_and_log_are_translations() {
        let metric = Euclidean::new(2).expect("dim").metric();
        let p = Array::vector(vec![1.0, 2.0]);
        let v = Array::vector(vec![0.5, -1.0]);
        let q = metric.exp(&v, &p).expect("exp");
        assert_eq!(q.values(), &[1.5, 1.0]);
        assert_eq!(metric.log(&q, &p).expect("log").values(), &[0.5, -1.0]);
        let d = metric.dist(&p, &q).expect("dist");
        assert!((d.values()[0] - 1.25_f64.sqrt()).abs() < 1e-15);
    }

    #[test]
    fn belongs_rejects_wrong_length() {
        let space = Euclidean::new(3).expect("dim");
        assert_eq!(
            space.belongs(&Array::vector(vec![1.0, 2.0]), 0.0),
            vec![false]
        );
        assert!(Euclidean::new(0).is_err());
    }
}
