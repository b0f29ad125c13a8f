#![forbid(unsafe_code)]

pub mod beta;
pub mod dirichlet;
pub mod euclidean;
pub mod grassmannian;
pub mod hypersphere;
pub mod landmarks;
pub mod special;
pub mod traits;

use gms_array::ShapeError;
use gms_linalg::LinAlgError;

pub use beta::{BetaDistributions, BetaMetric, BetaPdf};
pub use dirichlet::{DirichletDistributions, DirichletMetric};
pub use euclidean::{Euclidean, EuclideanMetric};
pub use grassmannian::{Grassmannian, GrassmannianCanonicalMetric};
pub use hypersphere::{Hypersphere, HypersphereMetric};
pub use landmarks::{L2Metric, Landmarks};
pub use traits::{Manifold, RiemannianMetric};

pub const GEOMETRY_REASON_CODES: [&str; 8] = [
    "geometry_shape_contract_violation",
    "geometry_operation_unsupported",
    "geometry_point_not_on_manifold",
    "geometry_cut_locus",
    "geometry_integration_blow_up",
    "geometry_log_nonconvergence",
    "geometry_invalid_parameter",
    "geometry_linalg_failure",
];

#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    Shape(ShapeError),
    Unsupported {
        space: &'static str,
        operation: &'static str,
    },
    NotOnManifold(&'static str),
    /// Points are conjugate along every minimising geodesic, so the
    /// logarithm has no unique value.
    CutLocus,
    IntegrationBlowUp {
        step: usize,
    },
    LogDidNotConverge {
        iterations: usize,
        residual: f64,
    },
    InvalidParameter(&'static str),
    LinAlg(LinAlgError),
}

impl GeometryError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Shape(_) => "geometry_shape_contract_violation",
            Self::Unsupported { .. } => "geometry_operation_unsupported",
            Self::NotOnManifold(_) => "geometry_point_not_on_manifold",
            Self::CutLocus => "geometry_cut_locus",
            Self::IntegrationBlowUp { .. } => "geometry_integration_blow_up",
            Self::LogDidNotConverge { .. } => "geometry_log_nonconvergence",
            Self::InvalidParameter(_) => "geometry_invalid_parameter",
            Self::LinAlg(_) => "geometry_linalg_failure",
        }
    }
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shape(err) => write!(f, "{err}"),
            Self::Unsupported { space, operation } => {
                write!(f, "{space} does not implement {operation}")
            }
            Self::NotOnManifold(msg) => write!(f, "{msg}"),
            Self::CutLocus => write!(f, "points lie on each other's cut locus"),
            Self::IntegrationBlowUp { step } => {
                write!(f, "geodesic integration left the domain at step {step}")
            }
            Self::LogDidNotConverge {
                iterations,
                residual,
            } => write!(
                f,
                "geodesic shooting did not converge after {iterations} iterations (residual {residual:e})"
            ),
            Self::InvalidParameter(msg) => write!(f, "{msg}"),
            Self::LinAlg(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for GeometryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Shape(err) => Some(err),
            Self::LinAlg(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShapeError> for GeometryError {
    fn from(err: ShapeError) -> Self {
        Self::Shape(err)
    }
}

impl From<LinAlgError> for GeometryError {
    fn from(err: LinAlgError) -> Self {
        Self::LinAlg(err)
    }
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

pub(crate) fn axpy(alpha: f64, x: &[f64], y: &[f64]) -> Vec<f64> {
    x.iter().zip(y).map(|(xi, yi)| alpha * xi + yi).collect()
}
