//! Case records shared by every provider.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseTier {
    /// Hand-picked literals.
    Smoke,
    /// Expectations computed from the library itself.
    Derived,
    /// Inputs drawn from a seeded parameter grid.
    Randomized,
}

impl CaseTier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Smoke => "smoke",
            Self::Derived => "derived",
            Self::Randomized => "randomized",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseRecord<I> {
    pub id: String,
    pub family: &'static str,
    pub tier: CaseTier,
    pub input: I,
}

fn tier_records<I>(family: &'static str, tier: CaseTier, inputs: Vec<I>) -> Vec<CaseRecord<I>> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| CaseRecord {
            id: format!("{family}/{}/{index}", tier.as_str()),
            family,
            tier,
            input,
        })
        .collect()
}

/// Smoke cases first, then randomized ones, each indexed from zero.
#[must_use]
pub fn generate_cases<I>(
    family: &'static str,
    smoke: Vec<I>,
    random: Vec<I>,
) -> Vec<CaseRecord<I>> {
    let mut cases = tier_records(family, CaseTier::Smoke, smoke);
    cases.extend(tier_records(family, CaseTier::Randomized, random));
    cases
}

#[must_use]
pub fn generate_derived_cases<I>(family: &'static str, derived: Vec<I>) -> Vec<CaseRecord<I>> {
    tier_records(family, CaseTier::Derived, derived)
}
