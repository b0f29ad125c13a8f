//! Object-safe manifold and metric contracts.
//!
//! Implementors provide the per-point kernels (`*_point`, `*_at`); the
//! provided methods lift them over arrays that hold either one point of
//! `point_shape()` or a leading batch axis of points.

use std::fmt::Debug;

use gms_array::{Array, Batch, ShapeError, assemble, assemble_scalars, broadcast_batches};
use gms_random::DeterministicRng;

use crate::GeometryError;

pub trait Manifold: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Intrinsic dimension.
    fn dim(&self) -> usize;

    /// Shape of a single point in its ambient representation. Tangent
    /// vectors share it.
    fn point_shape(&self) -> Vec<usize>;

    /// Scale used by [`Manifold::random_point`].
    fn default_bound(&self) -> f64 {
        1.0
    }

    fn belongs_point(&self, point: &[f64], atol: f64) -> bool;

    fn random_point_with(
        &self,
        rng: &mut DeterministicRng,
        bound: f64,
    ) -> Result<Vec<f64>, GeometryError>;

    fn projection_point(&self, point: &[f64]) -> Result<Vec<f64>, GeometryError>;

    fn to_tangent_point(
        &self,
        vector: &[f64],
        base_point: &[f64],
    ) -> Result<Vec<f64>, GeometryError>;

    fn is_tangent_point(&self, vector: &[f64], base_point: &[f64], atol: f64) -> bool;

    /// Gaussian ambient vector of standard deviation `scale`, moved to the
    /// tangent space at `base_point`.
    fn random_tangent_vec_at(
        &self,
        base_point: &[f64],
        rng: &mut DeterministicRng,
        scale: f64,
    ) -> Result<Vec<f64>, GeometryError> {
        let raw: Vec<f64> = rng
            .normal_vec(base_point.len())
            .into_iter()
            .map(|x| x * scale)
            .collect();
        self.to_tangent_point(&raw, base_point)
    }

    /// One flag per point. An input that is neither a point nor a batch of
    /// points yields `[false]`.
    fn belongs(&self, point: &Array, atol: f64) -> Vec<bool> {
        match point.split_batch(&self.point_shape()) {
            Ok(batch) => batch
                .points()
                .iter()
                .map(|p| self.belongs_point(p, atol))
                .collect(),
            Err(_) => vec![false],
        }
    }

    fn random_point(
        &self,
        n_samples: usize,
        rng: &mut DeterministicRng,
    ) -> Result<Array, GeometryError> {
        self.random_point_bounded(n_samples, rng, self.default_bound())
    }

    /// Shape `point_shape()` for one sample, `(n_samples, point_shape()…)`
    /// otherwise.
    fn random_point_bounded(
        &self,
        n_samples: usize,
        rng: &mut DeterministicRng,
        bound: f64,
    ) -> Result<Array, GeometryError> {
        if n_samples == 0 {
            return Err(GeometryError::InvalidParameter("n_samples must be positive"));
        }
        let points = (0..n_samples)
            .map(|_| self.random_point_with(rng, bound))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assemble(n_samples != 1, &self.point_shape(), points)?)
    }

    fn projection(&self, point: &Array) -> Result<Array, GeometryError> {
        let shape = self.point_shape();
        let batch = point.split_batch(&shape)?;
        let outputs = batch
            .points()
            .iter()
            .map(|p| self.projection_point(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assemble(batch.is_batched(), &shape, outputs)?)
    }

    fn to_tangent(&self, vector: &Array, base_point: &Array) -> Result<Array, GeometryError> {
        let shape = self.point_shape();
        let vectors = vector.split_batch(&shape)?;
        let bases = base_point.split_batch(&shape)?;
        let (batched, pairs) = broadcast_batches(&vectors, &bases)?;
        let outputs = pairs
            .iter()
            .map(|(v, p)| self.to_tangent_point(v, p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assemble(batched, &shape, outputs)?)
    }

    fn is_tangent(
        &self,
        vector: &Array,
        base_point: &Array,
        atol: f64,
    ) -> Result<Vec<bool>, GeometryError> {
        let shape = self.point_shape();
        let vectors = vector.split_batch(&shape)?;
        let bases = base_point.split_batch(&shape)?;
        let (_, pairs) = broadcast_batches(&vectors, &bases)?;
        Ok(pairs
            .iter()
            .map(|(v, p)| self.is_tangent_point(v, p, atol))
            .collect())
    }

    /// `n_samples` tangent vectors. A single base point is shared by all
    /// samples; a batch of base points must hold exactly `n_samples`.
    fn random_tangent_vec(
        &self,
        base_point: &Array,
        n_samples: usize,
        rng: &mut DeterministicRng,
        scale: f64,
    ) -> Result<Array, GeometryError> {
        let shape = self.point_shape();
        let bases = base_point.split_batch(&shape)?;
        if n_samples == 0 || (bases.is_batched() && bases.len() != n_samples) {
            return Err(GeometryError::InvalidParameter(
                "n_samples must match the number of base points",
            ));
        }
        let outputs = (0..n_samples)
            .map(|i| {
                let base = bases.points()[if bases.len() == 1 { 0 } else { i }];
                self.random_tangent_vec_at(base, rng, scale)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assemble(
            bases.is_batched() || n_samples != 1,
            &shape,
            outputs,
        )?)
    }
}

pub(crate) fn unsupported(space: &'static str, operation: &'static str) -> GeometryError {
    GeometryError::Unsupported { space, operation }
}

type Triple<'a> = (&'a [f64], &'a [f64], &'a [f64]);

fn broadcast_triples<'a>(
    a: &Batch<'a>,
    b: &Batch<'a>,
    c: &Batch<'a>,
) -> Result<(bool, Vec<Triple<'a>>), ShapeError> {
    let n = a.len().max(b.len()).max(c.len());
    for len in [a.len(), b.len(), c.len()] {
        if len != 1 && len != n {
            return Err(ShapeError::BatchLengthMismatch { lhs: len, rhs: n });
        }
    }
    let pick = |batch: &Batch<'a>, i: usize| batch.points()[if batch.len() == 1 { 0 } else { i }];
    let triples = (0..n).map(|i| (pick(a, i), pick(b, i), pick(c, i))).collect();
    Ok((
        a.is_batched() || b.is_batched() || c.is_batched(),
        triples,
    ))
}

pub trait RiemannianMetric: Debug + Send + Sync {
    fn space(&self) -> &dyn Manifold;

    fn inner_product_at(
        &self,
        tangent_a: &[f64],
        tangent_b: &[f64],
        base_point: &[f64],
    ) -> Result<f64, GeometryError>;

    fn exp_at(&self, tangent_vec: &[f64], base_point: &[f64]) -> Result<Vec<f64>, GeometryError>;

    fn log_at(&self, point: &[f64], base_point: &[f64]) -> Result<Vec<f64>, GeometryError>;

    /// Row-major `dim x dim` Gram matrix of the metric in coordinates.
    fn metric_matrix_at(&self, _base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        Err(unsupported(self.space().name(), "metric_matrix"))
    }

    /// `Γ^k_ij` flattened as `[k][i][j]`.
    fn christoffels_at(&self, _base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        Err(unsupported(self.space().name(), "christoffels"))
    }

    fn squared_dist_at(&self, point_a: &[f64], point_b: &[f64]) -> Result<f64, GeometryError> {
        let log = self.log_at(point_b, point_a)?;
        self.inner_product_at(&log, &log, point_a)
    }

    fn inner_product(
        &self,
        tangent_a: &Array,
        tangent_b: &Array,
        base_point: &Array,
    ) -> Result<Array, GeometryError> {
        let shape = self.space().point_shape();
        let a = tangent_a.split_batch(&shape)?;
        let b = tangent_b.split_batch(&shape)?;
        let base = base_point.split_batch(&shape)?;
        let (batched, triples) = broadcast_triples(&a, &b, &base)?;
        let outputs = triples
            .iter()
            .map(|(u, v, p)| self.inner_product_at(u, v, p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assemble_scalars(batched, outputs))
    }

    fn squared_norm(&self, vector: &Array, base_point: &Array) -> Result<Array, GeometryError> {
        self.inner_product(vector, vector, base_point)
    }

    fn norm(&self, vector: &Array, base_point: &Array) -> Result<Array, GeometryError> {
        Ok(self
            .squared_norm(vector, base_point)?
            .map(|sq| sq.max(0.0).sqrt()))
    }

    fn exp(&self, tangent_vec: &Array, base_point: &Array) -> Result<Array, GeometryError> {
        let shape = self.space().point_shape();
        let vectors = tangent_vec.split_batch(&shape)?;
        let bases = base_point.split_batch(&shape)?;
        let (batched, pairs) = broadcast_batches(&vectors, &bases)?;
        let outputs = pairs
            .iter()
            .map(|(v, p)| self.exp_at(v, p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assemble(batched, &shape, outputs)?)
    }

    fn log(&self, point: &Array, base_point: &Array) -> Result<Array, GeometryError> {
        let shape = self.space().point_shape();
        let points = point.split_batch(&shape)?;
        let bases = base_point.split_batch(&shape)?;
        let (batched, pairs) = broadcast_batches(&points, &bases)?;
        let outputs = pairs
            .iter()
            .map(|(q, p)| self.log_at(q, p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assemble(batched, &shape, outputs)?)
    }

    fn squared_dist(&self, point_a: &Array, point_b: &Array) -> Result<Array, GeometryError> {
        let shape = self.space().point_shape();
        let a = point_a.split_batch(&shape)?;
        let b = point_b.split_batch(&shape)?;
        let (batched, pairs) = broadcast_batches(&a, &b)?;
        let outputs = pairs
            .iter()
            .map(|(a, b)| self.squared_dist_at(a, b))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assemble_scalars(batched, outputs))
    }

    fn dist(&self, point_a: &Array, point_b: &Array) -> Result<Array, GeometryError> {
        Ok(self
            .squared_dist(point_a, point_b)?
            .map(|sq| sq.max(0.0).sqrt()))
    }

    fn metric_matrix(&self, base_point: &Array) -> Result<Array, GeometryError> {
        let space = self.space();
        let bases = base_point.split_batch(&space.point_shape())?;
        let outputs = bases
            .points()
            .iter()
            .map(|p| self.metric_matrix_at(p))
            .collect::<Result<Vec<_>, _>>()?;
        let dim = space.dim();
        Ok(assemble(bases.is_batched(), &[dim, dim], outputs)?)
    }

    fn christoffels(&self, base_point: &Array) -> Result<Array, GeometryError> {
        let space = self.space();
        let bases = base_point.split_batch(&space.point_shape())?;
        let outputs = bases
            .points()
            .iter()
            .map(|p| self.christoffels_at(p))
            .collect::<Result<Vec<_>, _>>()?;
        let dim = space.dim();
        Ok(assemble(bases.is_batched(), &[dim, dim, dim], outputs)?)
    }

    /// Samples `t ↦ exp(t v, p)` at `times`: shape `(len(times), point…)`,
    /// with a leading batch axis when the inputs are batched.
    fn geodesic(
        &self,
        initial_point: &Array,
        initial_tangent_vec: &Array,
        times: &[f64],
    ) -> Result<Array, GeometryError> {
        let shape = self.space().point_shape();
        let bases = initial_point.split_batch(&shape)?;
        let vectors = initial_tangent_vec.split_batch(&shape)?;
        let (batched, pairs) = broadcast_batches(&bases, &vectors)?;
        let mut outputs = Vec::with_capacity(pairs.len());
        for (p, v) in &pairs {
            let mut path = Vec::with_capacity(times.len() * p.len());
            for &t in times {
                let scaled: Vec<f64> = v.iter().map(|x| t * x).collect();
                path.extend(self.exp_at(&scaled, p)?);
            }
            outputs.push(path);
        }
        let mut out_shape = Vec::with_capacity(shape.len() + 1);
        out_shape.push(times.len());
        out_shape.extend_from_slice(&shape);
        Ok(assemble(batched, &out_shape, outputs)?)
    }

    /// Geodesic from `initial_point` reaching `end_point` at `t = 1`.
    fn geodesic_bvp(
        &self,
        initial_point: &Array,
        end_point: &Array,
        times: &[f64],
    ) -> Result<Array, GeometryError> {
        let initial_tangent_vec = self.log(end_point, initial_point)?;
        self.geodesic(initial_point, &initial_tangent_vec, times)
    }
}
