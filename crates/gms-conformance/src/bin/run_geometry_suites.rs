#![forbid(unsafe_code)]

use gms_conformance::{HarnessConfig, SuiteReport, run_all_geometry_suites, set_case_log_path};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    status: &'static str,
    fixture_seed: u64,
    mode: &'static str,
    case_log: Option<String>,
    suites: &'a [SuiteReport],
}

#[derive(Debug, Default)]
struct RunOptions {
    log_path: Option<PathBuf>,
    report_path: Option<PathBuf>,
    seed: Option<u64>,
}

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("run_geometry_suites failed: {err}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<bool, String> {
    let options = parse_args()?;
    let mut cfg = HarnessConfig::default_paths().with_env_overrides()?;
    if let Some(seed) = options.seed {
        cfg = cfg.with_seed(seed);
    }
    set_case_log_path(options.log_path.clone());

    let suites = run_all_geometry_suites(&cfg)?;
    for suite in &suites {
        println!(
            "{}: {}/{} passed",
            suite.suite, suite.pass_count, suite.case_count
        );
        for failure in &suite.failures {
            eprintln!("  {failure}");
        }
    }

    let passed = suites.iter().all(SuiteReport::all_passed);
    let summary = RunSummary {
        status: if passed { "pass" } else { "fail" },
        fixture_seed: cfg.fixture_seed,
        mode: cfg.mode(),
        case_log: options
            .log_path
            .as_ref()
            .map(|path| path.display().to_string()),
        suites: &suites,
    };
    let summary_json = serde_json::to_string_pretty(&summary)
        .map_err(|err| format!("failed serializing summary: {err}"))?;
    if let Some(report_path) = options.report_path {
        if let Some(parent) = report_path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "failed creating report directory {}: {err}",
                    parent.display()
                )
            })?;
        }
        fs::write(&report_path, summary_json.as_bytes())
            .map_err(|err| format!("failed writing report {}: {err}", report_path.display()))?;
        println!("wrote {}", report_path.display());
    } else {
        println!("{summary_json}");
    }
    Ok(passed)
}

fn parse_args() -> Result<RunOptions, String> {
    let mut options = RunOptions::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--log-path" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--log-path requires a value".to_string())?;
                options.log_path = Some(PathBuf::from(value));
            }
            "--report-path" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--report-path requires a value".to_string())?;
                options.report_path = Some(PathBuf::from(value));
            }
            "--seed" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--seed requires a value".to_string())?;
                options.seed = Some(
                    value
                        .parse::<u64>()
                        .map_err(|err| format!("invalid --seed value '{value}': {err}"))?,
                );
            }
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run -p gms-conformance --bin run_geometry_suites -- [--log-path <path>] [--report-path <path>] [--seed <u64>]"
                );
                std::process::exit(0);
            }
            unknown => return Err(format!("unknown argument: {unknown}")),
        }
    }
    Ok(options)
}
