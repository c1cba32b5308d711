// src/services/mod.rs

pub mod gate;     // accept/reject state machine; the ONLY path that mutates rules
pub mod insight;  // snapshot -> candidate detectors (deterministic)
pub mod ranker;   // recency/clarity/utility scoring + ordering
pub mod selector; // per-rule success tracking for hosts applying rules
pub mod store;    // durable keyed rule store; owns merge/eviction/versioning

// Public API
pub use gate::{Disposition, GateOutcome, RejectReason, WriteGate};
pub use insight::{CandidateGenerator, InsightCandidate};
pub use ranker::{RankedCandidate, UtilityRanker};
pub use selector::RuleSelector;
pub use store::{Evidence, MemoryStore, RuleExport, RuleRecord};

pub(crate) fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}
