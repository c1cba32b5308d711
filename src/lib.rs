// src/lib.rs
//! Selfrule-Core: durable, self-authored behavioral rules for a
//! conversational model — no hand-authored personality configuration.
//!
//! Per turn, an external extractor hands the pipeline one
//! [`FeatureSnapshot`]. The [`CandidateGenerator`] maps it to candidate
//! insights, the [`UtilityRanker`] orders them, and the [`WriteGate`] admits
//! at most one into the [`MemoryStore`] — creating, reinforcing (EMA
//! confidence) or replacing (versioned conflict resolution) a rule, followed
//! by one atomic checkpoint save. Everything here is synchronous and
//! single-writer.

pub mod commands;
pub mod config;
pub mod errors;
pub mod services;
pub mod snapshot;
pub mod utils;

pub use commands::{InitReport, Pipeline, TurnReport, ensure_initialized};
pub use config::CoreConfig;
pub use errors::{Error, Result};
pub use services::{
    CandidateGenerator, Disposition, Evidence, GateOutcome, InsightCandidate, MemoryStore,
    RankedCandidate, RejectReason, RuleExport, RuleRecord, RuleSelector, UtilityRanker, WriteGate,
};
pub use snapshot::{FeatureSnapshot, SignalKind, SignalSchema, SignalSpec, SignalValue};
