// src/services/ranker.rs
//! UtilityRanker: weighted combination of three normalized sub-scores.
//!
//! - recency: held at 1.0 in the single-turn case (the slot exists so a
//!   batched re-ranking of stale candidates can discount it later),
//! - clarity: inverse ambiguity proxy over the claim text itself,
//! - utility: the candidate's raw score from the generator.
//!
//! The final score is normalized by the weight sum, so weights need not sum
//! to 1. Ties break by ascending key — deterministic, reproducible.

use std::cmp::Ordering;

use crate::config::RankerConfig;
use crate::services::clamp01;
use crate::services::insight::InsightCandidate;

/// Hedge terms that make a claim itself read as vague.
const CLAIM_HEDGE_TERMS: &[&str] = &[
    "maybe", "perhaps", "probably", "possibly", "might", "i think", "sort of", "kind of",
    "seems",
];

/// Claims longer than this start paying a length penalty.
const CLARITY_LEN_BUDGET: usize = 120;

#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub candidate: InsightCandidate,
    pub recency: f64,
    pub clarity: f64,
    pub utility: f64,
    /// Final normalized ranking score in [0,1].
    pub score: f64,
}

#[derive(Debug)]
pub struct UtilityRanker {
    cfg: RankerConfig,
}

impl UtilityRanker {
    pub fn new(cfg: RankerConfig) -> Self {
        Self { cfg }
    }

    /// Annotate each candidate with a final score and sort descending.
    pub fn rank(&self, candidates: Vec<InsightCandidate>) -> Vec<RankedCandidate> {
        let w_sum = self.cfg.w_recency + self.cfg.w_clarity + self.cfg.w_utility;
        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .map(|c| {
                let recency = 1.0;
                let clarity = claim_clarity(&c.claim);
                let utility = clamp01(c.score);
                let score = clamp01(
                    (self.cfg.w_recency * recency
                        + self.cfg.w_clarity * clarity
                        + self.cfg.w_utility * utility)
                        / w_sum,
                );
                RankedCandidate {
                    candidate: c,
                    recency,
                    clarity,
                    utility,
                    score,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.candidate.key.cmp(&b.candidate.key))
        });
        ranked
    }
}

/// Inverse ambiguity proxy: 1.0 for a short, direct claim; each hedge term
/// occurrence and every char past the length budget pulls it down.
fn claim_clarity(claim: &str) -> f64 {
    let lower = claim.to_lowercase();
    let mut penalty = 0.0;
    for term in CLAIM_HEDGE_TERMS {
        penalty += 0.15 * count_occurrences(&lower, term) as f64;
    }
    let len = claim.chars().count();
    if len > CLARITY_LEN_BUDGET {
        penalty += (len - CLARITY_LEN_BUDGET) as f64 / 400.0;
    }
    clamp01(1.0 - penalty)
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut rest = haystack;
    while let Some(pos) = rest.find(needle) {
        count += 1;
        rest = &rest[pos + needle.len()..];
    }
    count
}
