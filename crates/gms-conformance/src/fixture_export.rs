//! Serialized case corpora and their digests.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::case::CaseRecord;
use crate::{HarnessConfig, beta_cases, grassmannian_cases, landmarks_cases};

pub const CORPUS_FILE_NAME: &str = "generated_cases.json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusSuite {
    pub suite: &'static str,
    pub case_count: usize,
    pub cases: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseCorpus {
    pub fixture_seed: u64,
    pub suites: Vec<CorpusSuite>,
}

impl CaseCorpus {
    #[must_use]
    pub fn case_count(&self) -> usize {
        self.suites.iter().map(|suite| suite.case_count).sum()
    }
}

fn push_records<I: Serialize>(
    suite: &'static str,
    records: &[CaseRecord<I>],
    out: &mut Vec<Value>,
) -> Result<(), String> {
    for record in records {
        let value = serde_json::to_value(record)
            .map_err(|err| format!("{suite}: failed serializing {}: {err}", record.id))?;
        out.push(value);
    }
    Ok(())
}

fn corpus_suite(suite: &'static str, cases: Vec<Value>) -> CorpusSuite {
    CorpusSuite {
        suite,
        case_count: cases.len(),
        cases,
    }
}

/// Every provider's cases for `config.fixture_seed`, in suite order.
pub fn build_case_corpus(config: &HarnessConfig) -> Result<CaseCorpus, String> {
    let mut suites = Vec::with_capacity(3);

    let beta = beta_cases::beta_cases(config)?;
    let mut cases = Vec::new();
    push_records(beta_cases::SUITE, &beta.manifold, &mut cases)?;
    push_records(beta_cases::SUITE, &beta.metric, &mut cases)?;
    push_records(beta_cases::SUITE, &beta.pdf, &mut cases)?;
    suites.push(corpus_suite(beta_cases::SUITE, cases));

    let landmarks = landmarks_cases::landmarks_cases(config)?;
    let mut cases = Vec::new();
    push_records(landmarks_cases::SUITE, &landmarks.manifold, &mut cases)?;
    push_records(landmarks_cases::SUITE, &landmarks.metric, &mut cases)?;
    suites.push(corpus_suite(landmarks_cases::SUITE, cases));

    let grassmannian = grassmannian_cases::grassmannian_cases(config)?;
    let mut cases = Vec::new();
    push_records(
        grassmannian_cases::SUITE,
        &grassmannian.manifold,
        &mut cases,
    )?;
    push_records(grassmannian_cases::SUITE, &grassmannian.metric, &mut cases)?;
    suites.push(corpus_suite(grassmannian_cases::SUITE, cases));

    Ok(CaseCorpus {
        fixture_seed: config.fixture_seed,
        suites,
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

/// SHA-256 of the compact JSON encoding.
pub fn corpus_digest(corpus: &CaseCorpus) -> Result<String, String> {
    let bytes =
        serde_json::to_vec(corpus).map_err(|err| format!("failed serializing corpus: {err}"))?;
    Ok(sha256_hex(&bytes))
}

/// Writes the pretty-printed corpus to `path` and returns its digest.
pub fn write_case_corpus(corpus: &CaseCorpus, path: &Path) -> Result<String, String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
    }
    let payload = serde_json::to_string_pretty(corpus)
        .map_err(|err| format!("failed serializing corpus: {err}"))?;
    fs::write(path, payload.as_bytes())
        .map_err(|err| format!("failed writing {}: {err}", path.display()))?;
    corpus_digest(corpus)
}

#[cfg(test)]
mod tests {
    use super::{build_case_corpus, corpus_digest, sha256_hex, write_case_corpus};
    use crate::HarnessConfig;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn sha256_hex_matches_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn corpus_lists_every_suite_with_ids() {
        let corpus = build_case_corpus(&HarnessConfig::default()).expect("corpus");
        let names: Vec<_> = corpus.suites.iter().map(|suite| suite.suite).collect();
        assert_eq!(names, vec!["beta", "landmarks", "grassmannian"]);
        for suite in &corpus.suites {
            assert_eq!(suite.case_count, suite.cases.len());
            assert!(suite.cases.iter().all(|case| case["id"].is_string()));
        }
        let first = &corpus.suites[0].cases[0];
        assert_eq!(first["id"], "belongs/smoke/0");
        assert_eq!(first["input"]["check"]["check"], "belongs");
    }

    #[test]
    fn written_corpus_reports_its_digest() {
        let corpus = build_case_corpus(&HarnessConfig::default()).expect("corpus");
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_nanos());
        let path = std::env::temp_dir().join(format!("gms_corpus_{nanos}/cases.json"));
        let digest = write_case_corpus(&corpus, &path).expect("write");
        assert_eq!(digest, corpus_digest(&corpus).expect("digest"));
        let text = std::fs::read_to_string(&path).expect("read back");
        assert!(text.contains("\"fixture_seed\""));
        let _ = std::fs::remove_dir_all(path.parent().expect("parent"));
    }
}
