// src/services/gate.rs
//! WriteGate: the accept/reject decision point for one turn's ranked
//! candidates.
//!
//! State machine: `Idle -> Evaluating -> {Accepted, Rejected} -> Idle`, one
//! invocation per turn. The single-acceptance constraint is the named
//! invariant here: only the top-ranked candidate is ever evaluated, so at
//! most one rule is created or mutated per turn no matter how many
//! candidates clear the threshold.

use serde::Serialize;

use crate::config::GateConfig;
use crate::errors::Result;
use crate::services::ranker::RankedCandidate;
use crate::services::store::{Evidence, MemoryStore};
use crate::snapshot::FeatureSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Evaluating,
}

/// How an accepted candidate landed in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Created,
    Reinforced,
    Replaced,
}

/// Why the turn produced no write. All of these are normal outcomes, not
/// errors; they are surfaced for observability only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    NoCandidates,
    /// The configured spacing between accepted writes has not elapsed.
    TooSoon {
        turns_since_accept: u64,
        min_gap_turns: u64,
    },
    BelowThreshold {
        score: f64,
        threshold: f64,
    },
    /// A different claim exists for the same key and the candidate did not
    /// beat its confidence by the configured margin. Stability over churn.
    ConflictRejected {
        key: String,
        score: f64,
        existing_confidence: f64,
        margin: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GateOutcome {
    Accepted {
        key: String,
        disposition: Disposition,
        confidence: f64,
        version: u32,
    },
    Rejected(RejectReason),
}

impl GateOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateOutcome::Accepted { .. })
    }
}

#[derive(Debug)]
pub struct WriteGate {
    cfg: GateConfig,
    state: GateState,
    turn_counter: u64,
    last_accepted_turn: Option<u64>,
}

impl WriteGate {
    pub fn new(cfg: GateConfig) -> Self {
        Self {
            cfg,
            state: GateState::Idle,
            turn_counter: 0,
            last_accepted_turn: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Turns seen by this gate so far.
    pub fn turns_seen(&self) -> u64 {
        self.turn_counter
    }

    /// Resolve one turn's ranked candidates against the store.
    ///
    /// Mutates the store only through its merge operations and only for the
    /// single accepted candidate. Persistence is the caller's write-through:
    /// exactly one `save()` after an Accepted outcome.
    pub fn resolve(
        &mut self,
        snapshot: &FeatureSnapshot,
        ranked: &[RankedCandidate],
        store: &mut MemoryStore,
    ) -> Result<GateOutcome> {
        self.state = GateState::Evaluating;
        self.turn_counter += 1;
        let outcome = self.evaluate(snapshot, ranked, store);
        if let Ok(GateOutcome::Accepted { .. }) = outcome {
            self.last_accepted_turn = Some(self.turn_counter);
        }
        self.state = GateState::Idle;
        outcome
    }

    fn evaluate(
        &self,
        snapshot: &FeatureSnapshot,
        ranked: &[RankedCandidate],
        store: &mut MemoryStore,
    ) -> Result<GateOutcome> {
        if let Some(last) = self.last_accepted_turn {
            let since = self.turn_counter - last;
            if since < self.cfg.min_gap_turns {
                return Ok(GateOutcome::Rejected(RejectReason::TooSoon {
                    turns_since_accept: since,
                    min_gap_turns: self.cfg.min_gap_turns,
                }));
            }
        }

        // Hard cap: everything but the top-ranked candidate is discarded
        // regardless of its own score.
        let Some(top) = ranked.first() else {
            return Ok(GateOutcome::Rejected(RejectReason::NoCandidates));
        };

        if top.score < self.cfg.accept_threshold {
            return Ok(GateOutcome::Rejected(RejectReason::BelowThreshold {
                score: top.score,
                threshold: self.cfg.accept_threshold,
            }));
        }

        let cand = &top.candidate;
        let evidence = Some(Evidence {
            turn_id: snapshot.turn_id.clone(),
            ts: snapshot.ts,
            excerpt_digest: snapshot.excerpt_digest(),
        });

        // Decide first against a shared view, then apply the single merge op.
        let disposition = match store.get(&cand.key) {
            None => Disposition::Created,
            Some(existing) if existing.claim == cand.claim => Disposition::Reinforced,
            Some(existing) => {
                // Conflict: a different claim holds this key. Replace only
                // when the candidate clearly beats the incumbent.
                if top.score - existing.confidence >= self.cfg.conflict_margin {
                    Disposition::Replaced
                } else {
                    return Ok(GateOutcome::Rejected(RejectReason::ConflictRejected {
                        key: cand.key.clone(),
                        score: top.score,
                        existing_confidence: existing.confidence,
                        margin: self.cfg.conflict_margin,
                    }));
                }
            }
        };

        let rec = match disposition {
            Disposition::Created => store.create(
                &cand.key,
                &cand.claim,
                top.score,
                cand.signals.clone(),
                evidence,
                snapshot.ts,
            ),
            Disposition::Reinforced => store.reinforce(
                &cand.key,
                top.score,
                self.cfg.ema_alpha,
                cand.signals.clone(),
                evidence,
                snapshot.ts,
            )?,
            Disposition::Replaced => store.replace_claim(
                &cand.key,
                &cand.claim,
                top.score,
                cand.signals.clone(),
                evidence,
                snapshot.ts,
            )?,
        };

        tracing::debug!(
            turn_id = %snapshot.turn_id,
            key = %rec.key,
            ?disposition,
            confidence = rec.confidence,
            version = rec.version,
            "candidate accepted"
        );

        Ok(GateOutcome::Accepted {
            key: rec.key.clone(),
            disposition,
            confidence: rec.confidence,
            version: rec.version,
        })
    }
}
