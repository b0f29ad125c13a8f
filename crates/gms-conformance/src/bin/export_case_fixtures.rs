#![forbid(unsafe_code)]

use gms_conformance::HarnessConfig;
use gms_conformance::fixture_export::{CORPUS_FILE_NAME, build_case_corpus, write_case_corpus};
use std::path::PathBuf;

fn main() {
    if let Err(err) = run() {
        eprintln!("export_case_fixtures failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let cfg = HarnessConfig::default_paths().with_env_overrides()?;
    let output_path = match parse_output_arg()? {
        Some(path) => path,
        None => cfg.fixture_root.join(CORPUS_FILE_NAME),
    };

    let corpus = build_case_corpus(&cfg)?;
    let digest = write_case_corpus(&corpus, &output_path)?;
    for suite in &corpus.suites {
        println!("{}: {} cases", suite.suite, suite.case_count);
    }
    println!(
        "wrote {} cases (seed {:#x}) to {}",
        corpus.case_count(),
        corpus.fixture_seed,
        output_path.display()
    );
    println!("sha256 {digest}");
    Ok(())
}

fn parse_output_arg() -> Result<Option<PathBuf>, String> {
    let mut output = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--output" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--output requires a value".to_string())?;
                output = Some(PathBuf::from(value));
            }
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run -p gms-conformance --bin export_case_fixtures -- [--output <path>]"
                );
                std::process::exit(0);
            }
            unknown => return Err(format!("unknown argument: {unknown}")),
        }
    }
    Ok(output)
}
