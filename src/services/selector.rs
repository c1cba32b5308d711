// src/services/selector.rs
//! RuleSelector: per-rule outcome tracking for hosts that apply accepted
//! rules and want to prefer the ones that actually help.
//!
//! Each rule key is an arm with Laplace-seeded success/failure counts. The
//! selection is deterministic — highest empirical success ratio, ties broken
//! by ascending key — in keeping with the crate's reproducibility posture.
//! In-memory only; this is host-session state, not part of the rule store.

use std::collections::BTreeMap;

use crate::services::store::MemoryStore;

#[derive(Debug, Clone, Copy)]
struct ArmStats {
    success: u32,
    failure: u32,
}

impl ArmStats {
    fn ratio(&self) -> f64 {
        f64::from(self.success) / f64::from(self.success + self.failure)
    }
}

#[derive(Debug, Default)]
pub struct RuleSelector {
    arms: BTreeMap<String, ArmStats>,
}

impl RuleSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an arm with a neutral prior if it is not already tracked.
    pub fn add_if_absent(&mut self, key: &str) {
        self.arms
            .entry(key.to_string())
            .or_insert(ArmStats { success: 1, failure: 1 });
    }

    /// Register every rule currently held by the store.
    pub fn sync(&mut self, store: &MemoryStore) {
        for rec in store.records() {
            self.add_if_absent(&rec.key);
        }
    }

    /// Pick the arm with the best observed success ratio, or `None` when no
    /// arms exist. Equal ratios resolve to the lexicographically first key.
    pub fn select(&self) -> Option<&str> {
        let mut best: Option<(&str, f64)> = None;
        for (key, stats) in &self.arms {
            let r = stats.ratio();
            match best {
                Some((_, best_r)) if r <= best_r => {}
                _ => best = Some((key.as_str(), r)),
            }
        }
        best.map(|(k, _)| k)
    }

    /// Feed back the outcome of applying a rule. Positive reward counts as a
    /// success, anything else as a failure.
    pub fn update(&mut self, key: &str, reward: f64) {
        self.add_if_absent(key);
        if let Some(stats) = self.arms.get_mut(key) {
            if reward > 0.0 {
                stats.success = stats.success.saturating_add(1);
            } else {
                stats.failure = stats.failure.saturating_add(1);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.arms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }
}
