// src/commands/api.rs
//! Pipeline: the per-turn orchestration surface.
//!
//! Single-threaded, single-writer: one snapshot is processed to completion
//! (generate -> rank -> gate -> persist) before the next is accepted. The
//! store instance is owned here and injected into the gate — no ambient
//! global. A host that wants parallel turns takes an exclusive lock around
//! one `process_turn` call.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::commands::init::ensure_initialized;
use crate::config::CoreConfig;
use crate::errors::Result;
use crate::services::gate::{GateOutcome, WriteGate};
use crate::services::insight::CandidateGenerator;
use crate::services::ranker::UtilityRanker;
use crate::services::store::{MemoryStore, RuleExport, RuleRecord};
use crate::snapshot::FeatureSnapshot;
use crate::utils::logbook::{emit_event, record_action};

/// What one turn did. `persisted` is true iff the accepted write-through
/// reached durable storage.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub turn_id: String,
    /// Candidates the generator emitted for this turn.
    pub candidates: usize,
    pub outcome: GateOutcome,
    pub persisted: bool,
}

#[derive(Debug)]
pub struct Pipeline {
    config: CoreConfig,
    generator: CandidateGenerator,
    ranker: UtilityRanker,
    gate: WriteGate,
    store: MemoryStore,
}

impl Pipeline {
    /// Initialize the root layout, load config and the persisted store, and
    /// wire the pipeline. Fails with `Error::CorruptStore` when the persisted
    /// state is unreadable — the session must not start on a guessed store.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        ensure_initialized(&root)?;
        let config = CoreConfig::load(&root)?;
        Self::with_config(config)
    }

    /// Wire a pipeline from an already-resolved configuration.
    pub fn with_config(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        let store = MemoryStore::load(&config.store.path)?;
        let generator = CandidateGenerator::new(config.signals.clone(), config.generator.clone());
        let ranker = UtilityRanker::new(config.ranker.clone());
        let gate = WriteGate::new(config.gate.clone());
        tracing::info!(
            store = %store.path().display(),
            rules = store.len(),
            "pipeline ready"
        );
        Ok(Self {
            config,
            generator,
            ranker,
            gate,
            store,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Process one assistant turn end to end.
    ///
    /// Generation/ranking errors abort only this turn (no store mutation).
    /// An accepted candidate triggers exactly one `save()` within the same
    /// call, so a crash between turns never loses more than the in-flight
    /// turn.
    pub fn process_turn(&mut self, snapshot: &FeatureSnapshot) -> Result<TurnReport> {
        let candidates = self.generator.generate(snapshot)?;
        let n_candidates = candidates.len();
        let ranked = self.ranker.rank(candidates);
        let outcome = self.gate.resolve(snapshot, &ranked, &mut self.store)?;

        let persisted = if outcome.is_accepted() {
            self.store.save()?;
            true
        } else {
            false
        };

        let report = TurnReport {
            turn_id: snapshot.turn_id.clone(),
            candidates: n_candidates,
            outcome,
            persisted,
        };
        self.log_turn(&report);
        Ok(report)
    }

    /// Explicit maintenance: remove never-reinforced, low-confidence rules
    /// older than the retention window. Never invoked by the gating path.
    /// Returns the evicted records; saves only when something was removed.
    pub fn evict_stale(&mut self, now: DateTime<Utc>) -> Result<Vec<RuleRecord>> {
        let min_confidence = self.config.eviction.eviction_min_confidence;
        let max_age = Duration::days(i64::from(self.config.eviction.eviction_age_days));
        let removed = self.store.evict(|r| {
            r.confidence < min_confidence
                && r.reinforcement_count == 1
                && now - r.last_reinforced_at > max_age
        });
        if !removed.is_empty() {
            self.store.save()?;
            let keys: Vec<&str> = removed.iter().map(|r| r.key.as_str()).collect();
            tracing::info!(evicted = removed.len(), "stale rules evicted");
            let _ = record_action(
                self.logbook_dir(),
                "store",
                "rules_evicted",
                &json!({ "keys": keys, "count": removed.len() }),
                "medium",
            );
        }
        Ok(removed)
    }

    /// Ordered-by-key view of the persisted rules.
    pub fn rules(&self) -> impl Iterator<Item = &RuleRecord> {
        self.store.records()
    }

    /// Read-only enumeration for the external ontograph exporter.
    pub fn export(&self) -> Vec<RuleExport> {
        self.store.export()
    }

    fn logbook_dir(&self) -> &Path {
        &self.config.logbook.path
    }

    // Best-effort observability; a logbook failure never fails the turn.
    fn log_turn(&self, report: &TurnReport) {
        let details = serde_json::to_value(report).unwrap_or_else(|_| json!({}));
        let (action, severity) = match &report.outcome {
            GateOutcome::Accepted { .. } => ("candidate_accepted", "low"),
            GateOutcome::Rejected(_) => ("candidate_rejected", "low"),
        };
        let _ = record_action(self.logbook_dir(), "gate", action, &details, severity);
        let _ = emit_event(
            &self.config.logbook.aggregate,
            "turn_processed",
            details,
            &Utc::now().to_rfc3339(),
        );
        tracing::info!(
            turn_id = %report.turn_id,
            candidates = report.candidates,
            persisted = report.persisted,
            "turn processed"
        );
    }
}
