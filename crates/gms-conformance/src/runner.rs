//! Case execution: isolation, assertions, and reporting.

use std::panic::{self, AssertUnwindSafe};

use gms_array::{Array, ShapeError, compare_arrays};
use gms_geometry::GeometryError;

use crate::case::{CaseRecord, CaseTier};
use crate::{
    CaseLogEntry, HARDENED_TOLERANCE_FACTOR, HarnessConfig, SuiteReport, maybe_append_case_log,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub abs: f64,
    pub rel: f64,
}

impl Tolerance {
    #[must_use]
    pub fn for_case(config: &HarnessConfig, tier: CaseTier) -> Self {
        let factor = if !config.strict_mode && tier == CaseTier::Randomized {
            HARDENED_TOLERANCE_FACTOR
        } else {
            1.0
        };
        Self {
            abs: config.abs_tol * factor,
            rel: config.rel_tol * factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFailure {
    pub reason_code: String,
    pub detail: String,
}

impl CaseFailure {
    pub fn new(reason_code: &str, detail: impl Into<String>) -> Self {
        Self {
            reason_code: reason_code.to_string(),
            detail: detail.into(),
        }
    }
}

impl From<GeometryError> for CaseFailure {
    fn from(err: GeometryError) -> Self {
        Self::new(err.reason_code(), err.to_string())
    }
}

impl From<ShapeError> for CaseFailure {
    fn from(err: ShapeError) -> Self {
        Self::new(err.reason_code(), err.to_string())
    }
}

pub fn expect_close(
    what: &str,
    expected: &Array,
    actual: &Array,
    tol: Tolerance,
) -> Result<(), CaseFailure> {
    let comparison = compare_arrays(expected, actual, tol.abs, tol.rel);
    if comparison.pass {
        return Ok(());
    }
    let reason = comparison.reason.as_deref().unwrap_or("arrays differ");
    Err(CaseFailure::new("value_mismatch", format!("{what}: {reason}")))
}

pub fn expect_shape(what: &str, actual: &Array, expected: &[usize]) -> Result<(), CaseFailure> {
    if actual.shape() == expected {
        Ok(())
    } else {
        Err(CaseFailure::new(
            "shape_mismatch",
            format!(
                "{what}: expected shape {expected:?}, got {:?}",
                actual.shape()
            ),
        ))
    }
}

pub fn expect_flags(what: &str, actual: &[bool], expected: &[bool]) -> Result<(), CaseFailure> {
    if actual == expected {
        Ok(())
    } else {
        Err(CaseFailure::new(
            "flag_mismatch",
            format!("{what}: expected {expected:?}, got {actual:?}"),
        ))
    }
}

pub fn expect_all(what: &str, flags: &[bool]) -> Result<(), CaseFailure> {
    match flags.iter().position(|flag| !flag) {
        None => Ok(()),
        Some(index) => Err(CaseFailure::new(
            "flag_mismatch",
            format!("{what} is false at index {index} of {}", flags.len()),
        )),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Runs cases one at a time; a failing or panicking case never affects its
/// siblings.
#[derive(Debug)]
pub struct CaseRunner<'a> {
    config: &'a HarnessConfig,
    report: SuiteReport,
}

impl<'a> CaseRunner<'a> {
    #[must_use]
    pub fn new(suite: &'static str, config: &'a HarnessConfig) -> Self {
        Self {
            config,
            report: SuiteReport {
                suite,
                case_count: 0,
                pass_count: 0,
                failures: Vec::new(),
            },
        }
    }

    /// Returns whether the case passed. `Err` only for logging failures.
    pub fn run<I>(
        &mut self,
        case: &CaseRecord<I>,
        execute: impl Fn(&I, Tolerance) -> Result<(), CaseFailure>,
    ) -> Result<bool, String> {
        let tol = Tolerance::for_case(self.config, case.tier);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| execute(&case.input, tol)))
            .unwrap_or_else(|payload| {
                Err(CaseFailure::new(
                    "case_panicked",
                    format!("panicked: {}", panic_message(payload.as_ref())),
                ))
            });

        self.report.case_count += 1;
        let (passed, reason_code, detail) = match &outcome {
            Ok(()) => (true, "ok", ""),
            Err(failure) => (false, failure.reason_code.as_str(), failure.detail.as_str()),
        };
        if passed {
            self.report.pass_count += 1;
        } else {
            self.report.failures.push(format!("{}: {detail}", case.id));
        }

        maybe_append_case_log(&CaseLogEntry {
            suite: self.report.suite,
            fixture_id: &case.id,
            family: case.family,
            tier: case.tier.as_str(),
            seed: self.config.fixture_seed,
            mode: self.config.mode(),
            reason_code,
            passed,
            detail,
        })?;
        Ok(passed)
    }

    pub fn run_all<I>(
        &mut self,
        cases: &[CaseRecord<I>],
        execute: impl Fn(&I, Tolerance) -> Result<(), CaseFailure>,
    ) -> Result<(), String> {
        for case in cases {
            self.run(case, &execute)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn finish(self) -> SuiteReport {
        self.report
    }
}
