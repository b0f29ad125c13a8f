#![forbid(unsafe_code)]

pub mod beta_cases;
pub mod case;
pub mod fixture_export;
pub mod grassmannian_cases;
pub mod grid;
pub mod landmarks_cases;
pub mod manifold_cases;
pub mod metric_cases;
pub mod runner;

use gms_random::DEFAULT_FIXTURE_SEED;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

pub const FIXTURE_SEED_ENV: &str = "GMS_FIXTURE_SEED";
pub const STRICT_MODE_ENV: &str = "GMS_STRICT_MODE";
pub const CASE_LOG_PATH_ENV: &str = "GMS_CASE_LOG_PATH";

/// Randomized-tier tolerances are widened by this factor outside strict mode.
pub const HARDENED_TOLERANCE_FACTOR: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub fixture_root: PathBuf,
    pub fixture_seed: u64,
    pub abs_tol: f64,
    pub rel_tol: f64,
    pub strict_mode: bool,
}

impl HarnessConfig {
    #[must_use]
    pub fn default_paths() -> Self {
        Self {
            fixture_root: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures"),
            fixture_seed: DEFAULT_FIXTURE_SEED,
            abs_tol: 1e-6,
            rel_tol: 1e-6,
            strict_mode: true,
        }
    }

    /// Applies `GMS_FIXTURE_SEED` (decimal or `0x` hex) and `GMS_STRICT_MODE`.
    pub fn with_env_overrides(mut self) -> Result<Self, String> {
        if let Ok(raw) = std::env::var(FIXTURE_SEED_ENV) {
            self.fixture_seed = parse_seed(&raw)
                .ok_or_else(|| format!("{FIXTURE_SEED_ENV} is not a u64 seed: {raw:?}"))?;
        }
        if let Ok(raw) = std::env::var(STRICT_MODE_ENV) {
            self.strict_mode = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "strict" => true,
                "0" | "false" | "hardened" => false,
                other => return Err(format!("{STRICT_MODE_ENV} has unknown value {other:?}")),
            };
        }
        Ok(self)
    }

    #[must_use]
    pub fn with_seed(mut self, fixture_seed: u64) -> Self {
        self.fixture_seed = fixture_seed;
        self
    }

    #[must_use]
    pub fn mode(&self) -> &'static str {
        if self.strict_mode { "strict" } else { "hardened" }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}

fn parse_seed(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16).ok(),
        None => raw.replace('_', "").parse().ok(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    pub suite: &'static str,
    pub case_count: usize,
    pub pass_count: usize,
    pub failures: Vec<String>,
}

impl SuiteReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.case_count == self.pass_count && self.failures.is_empty()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CaseLogEntry<'a> {
    pub suite: &'static str,
    pub fixture_id: &'a str,
    pub family: &'static str,
    pub tier: &'static str,
    pub seed: u64,
    pub mode: &'static str,
    pub reason_code: &'a str,
    pub passed: bool,
    pub detail: &'a str,
}

static CASE_LOG_PATH: OnceLock<Mutex<Option<PathBuf>>> = OnceLock::new();

pub fn set_case_log_path(path: Option<PathBuf>) {
    let cell = CASE_LOG_PATH.get_or_init(|| Mutex::new(None));
    if let Ok(mut slot) = cell.lock() {
        *slot = path;
    }
}

pub(crate) fn maybe_append_case_log(entry: &CaseLogEntry<'_>) -> Result<(), String> {
    let configured = CASE_LOG_PATH
        .get()
        .and_then(|cell| cell.lock().ok())
        .and_then(|slot| slot.clone());
    let from_env = std::env::var_os(CASE_LOG_PATH_ENV).map(PathBuf::from);
    let Some(path) = configured.or(from_env) else {
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| format!("failed opening {}: {err}", path.display()))?;
    let line = serde_json::to_string(entry)
        .map_err(|err| format!("failed serializing case log entry: {err}"))?;
    let mut payload = line.into_bytes();
    payload.push(b'\n');
    file.write_all(&payload)
        .map_err(|err| format!("failed appending case log {}: {err}", path.display()))
}

pub fn run_all_geometry_suites(config: &HarnessConfig) -> Result<Vec<SuiteReport>, String> {
    Ok(vec![
        beta_cases::run_beta_suite(config)?,
        landmarks_cases::run_landmarks_suite(config)?,
        grassmannian_cases::run_grassmannian_suite(config)?,
    ])
}
