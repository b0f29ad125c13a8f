use gms_array::Array;
use gms_random::DeterministicRng;

use crate::GeometryError;
use crate::dirichlet::{DirichletDistributions, DirichletMetric};
use crate::special::ln_beta;
use crate::traits::{Manifold, RiemannianMetric};

/// Beta distributions, parameterised by `(a, b)` with both positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetaDistributions {
    inner: DirichletDistributions,
}

impl Default for BetaDistributions {
    fn default() -> Self {
        Self::new()
    }
}

impl BetaDistributions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: DirichletDistributions::two_parameter(),
        }
    }

    #[must_use]
    pub fn metric(self) -> BetaMetric {
        BetaMetric {
            space: self,
            inner: self.inner.metric(),
        }
    }

    /// Densities of the distributions at `points`, ready to be evaluated on
    /// a grid of `[0, 1]`.
    pub fn point_to_pdf(&self, points: &Array) -> Result<BetaPdf, GeometryError> {
        let batch = points.split_batch(&self.point_shape())?;
        let mut parameters = Vec::with_capacity(batch.len());
        for point in batch.points() {
            if !self.belongs_point(point, 0.0) {
                return Err(GeometryError::NotOnManifold(
                    "beta parameters must be positive",
                ));
            }
            parameters.push((point[0], point[1]));
        }
        Ok(BetaPdf {
            batched: batch.is_batched(),
            parameters,
        })
    }
}

impl Manifold for BetaDistributions {
    fn name(&self) -> &'static str {
        "beta_distributions"
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn point_shape(&self) -> Vec<usize> {
        self.inner.point_shape()
    }

    fn default_bound(&self) -> f64 {
        self.inner.default_bound()
    }

    fn belongs_point(&self, point: &[f64], atol: f64) -> bool {
        self.inner.belongs_point(point, atol)
    }

    fn random_point_with(
        &self,
        rng: &mut DeterministicRng,
        bound: f64,
    ) -> Result<Vec<f64>, GeometryError> {
        self.inner.random_point_with(rng, bound)
    }

    fn projection_point(&self, point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        self.inner.projection_point(point)
    }

    fn to_tangent_point(
        &self,
        vector: &[f64],
        base_point: &[f64],
    ) -> Result<Vec<f64>, GeometryError> {
        self.inner.to_tangent_point(vector, base_point)
    }

    fn is_tangent_point(&self, vector: &[f64], base_point: &[f64], atol: f64) -> bool {
        self.inner.is_tangent_point(vector, base_point, atol)
    }

    fn random_tangent_vec_at(
        &self,
        base_point: &[f64],
        rng: &mut DeterministicRng,
        scale: f64,
    ) -> Result<Vec<f64>, GeometryError> {
        self.inner.random_tangent_vec_at(base_point, rng, scale)
    }
}

/// Family of Beta densities `x^(a-1) (1-x)^(b-1) / B(a, b)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BetaPdf {
    batched: bool,
    parameters: Vec<(f64, f64)>,
}

impl BetaPdf {
    #[must_use]
    pub fn parameters(&self) -> &[(f64, f64)] {
        &self.parameters
    }

    /// Shape `(m,)` for a single distribution, `(n, m)` for `n` of them,
    /// where `m` is the number of grid values in `x`.
    pub fn evaluate(&self, x: &Array) -> Result<Array, GeometryError> {
        let grid = x.values();
        let mut values = Vec::with_capacity(self.parameters.len() * grid.len());
        for &(a, b) in &self.parameters {
            let scale = (-ln_beta(a, b)).exp();
            values.extend(
                grid.iter()
                    .map(|&t| t.powf(a - 1.0) * (1.0 - t).powf(b - 1.0) * scale),
            );
        }
        let shape = if self.batched {
            vec![self.parameters.len(), grid.len()]
        } else {
            vec![grid.len()]
        };
        Ok(Array::new(shape, values)?)
    }
}

/// Fisher–Rao metric on [`BetaDistributions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetaMetric {
    space: BetaDistributions,
    inner: DirichletMetric,
}

impl BetaMetric {
    #[must_use]
    pub fn with_steps(mut self, n_steps: usize) -> Self {
        self.inner = self.inner.with_steps(n_steps);
        self
    }
}

impl RiemannianMetric for BetaMetric {
    fn space(&self) -> &dyn Manifold {
        &self.space
    }

    fn inner_product_at(
        &self,
        tangent_a: &[f64],
        tangent_b: &[f64],
        base_point: &[f64],
    ) -> Result<f64, GeometryError> {
        self.inner
            .inner_product_at(tangent_a, tangent_b, base_point)
    }

    fn exp_at(&self, tangent_vec: &[f64], base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        self.inner.exp_at(tangent_vec, base_point)
    }

    fn log_at(&self, point: &[f64], base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        self.inner.log_at(point, base_point)
    }

    fn metric_matrix_at(&self, base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        self.inner.metric_matrix_at(base_point)
    }

    fn christoffels_at(&self, base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        self.inner.christoffels_at(base_point)
    }
}

#[cfg(test)]
mod tests {
    use super::BetaDistributions;
    use crate::traits::{Manifold, RiemannianMetric};
    use gms_array::{Array, all_close};
    use gms_random::DeterministicRng;

    #[test]
    fn uniform_and_parabolic_densities() {
        let space = BetaDistributions::new();
        let x = Array::linspace(0.0, 1.0, 5);
        let uniform = space
            .point_to_pdf(&Array::vector(vec![1.0, 1.0]))
            .expect("pdf")
            .evaluate(&x)
            .expect("evaluate");
        assert!(all_close(&Array::vector(vec![1.0; 5]), &uniform, 1e-12, 0.0));

        let parabola = space
            .point_to_pdf(&Array::vector(vec![2.0, 2.0]))
            .expect("pdf")
            .evaluate(&x)
            .expect("evaluate");
        let expected = x.map(|t| 6.0 * t * (1.0 - t));
        assert!(all_close(&expected, &parabola, 1e-12, 1e-12));
    }

    #[test]
    fn batched_pdf_stacks_rows() {
        let space = BetaDistributions::new();
        let mut rng = DeterministicRng::new(8);
        let points = space.random_point(3, &mut rng).expect("points");
        let x = Array::linspace(0.0, 1.0, 10);
        let pdf = space.point_to_pdf(&points).expect("pdf");
        assert_eq!(pdf.evaluate(&x).expect("evaluate").shape(), &[3, 10]);
    }

    #[test]
    fn pdf_rejects_non_positive_parameters() {
        let space = BetaDistributions::new();
        assert!(space.point_to_pdf(&Array::vector(vec![-1.0, 2.0])).is_err());
    }

    #[test]
    fn christoffels_have_cube_shape() {
        let space = BetaDistributions::new();
        let metric = space.metric();
        let mut rng = DeterministicRng::new(4);
        let points = space.random_point(10, &mut rng).expect("points");
        let gamma = metric.christoffels(&points).expect("christoffels");
        assert_eq!(gamma.shape(), &[10, 2, 2, 2]);
    }
}
