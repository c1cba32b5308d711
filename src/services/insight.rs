// src/services/insight.rs
//! CandidateGenerator: map one validated snapshot to zero-or-more insight
//! candidates, each with a provisional utility score in [0,1].
//!
//! Detectors run in a fixed order over declared signals only. Same snapshot
//! and configuration always yields the same candidate keys, claims and
//! scores; candidate ids are uuids and carry no ranking meaning. No
//! cross-key deduplication happens here — that is the gate's job.

use uuid::Uuid;

use crate::config::GeneratorConfig;
use crate::errors::Result;
use crate::services::clamp01;
use crate::snapshot::{FeatureSnapshot, SignalSchema};

/// A transient, unvetted proposal for a self-rule. Lives for one gating pass.
#[derive(Debug, Clone)]
pub struct InsightCandidate {
    pub id: String,
    /// Short, stable, namespaced key (e.g. `style:shorter_blocks`).
    pub key: String,
    /// Human-readable claim. Never used for deduplication.
    pub claim: String,
    /// Provisional composite utility in [0,1].
    pub score: f64,
    pub source_turn_id: String,
    /// Signal names that triggered this candidate.
    pub signals: Vec<String>,
}

#[derive(Debug)]
pub struct CandidateGenerator {
    schema: SignalSchema,
    cfg: GeneratorConfig,
}

impl CandidateGenerator {
    pub fn new(schema: SignalSchema, cfg: GeneratorConfig) -> Self {
        Self { schema, cfg }
    }

    pub fn schema(&self) -> &SignalSchema {
        &self.schema
    }

    /// Produce the turn's candidates.
    ///
    /// Fails with `Error::InvalidSnapshot` when the snapshot violates the
    /// declared schema (missing required signal, wrong type, undeclared
    /// name). The turn is then skipped and the store untouched.
    pub fn generate(&self, snap: &FeatureSnapshot) -> Result<Vec<InsightCandidate>> {
        snap.validate(&self.schema)?;

        let mut out = Vec::new();
        let mut add = |key: String, claim: &str, score: f64, signals: &[&str]| {
            out.push(InsightCandidate {
                id: candidate_id(),
                key,
                claim: claim.to_string(),
                score: clamp01(score),
                source_turn_id: snap.turn_id.clone(),
                signals: signals.iter().map(|s| s.to_string()).collect(),
            });
        };

        let num = |name: &str| snap.signals.get(name).and_then(|v| v.as_number());
        let flag = |name: &str| snap.signals.get(name).and_then(|v| v.as_bool()).unwrap_or(false);
        let text = |name: &str| snap.signals.get(name).and_then(|v| v.as_text());

        // Overlong reply relative to the configured maximum carried in the
        // snapshot. Severity grows with the overflow ratio.
        if let (Some(len), Some(max)) = (num("reply_length"), num("max_length")) {
            if max > 0.0 && len > max {
                add(
                    "style:shorter_blocks".into(),
                    "keep answers concise and structured; prefer short paragraphs or lists",
                    0.4 + 0.1 * (len / max - 1.0),
                    &["reply_length", "max_length"],
                );
            }
        }

        if let Some(hedges) = num("hedge_count") {
            if hedges >= f64::from(self.cfg.hedge_min) {
                add(
                    "style:reduce_hedging".into(),
                    "avoid hedging qualifiers; state conclusions directly",
                    0.3 + 0.1 * hedges,
                    &["hedge_count"],
                );
            }
        }

        if flag("tail_invite") {
            add(
                "belief:no_tail_invites".into(),
                "do not end replies with trailing invitations such as 'let me know'",
                0.6,
                &["tail_invite"],
            );
        }

        if flag("apology") {
            add(
                "belief:no_apologies".into(),
                "avoid unnecessary apologies and AI self-reference",
                0.65,
                &["apology"],
            );
        }

        if let Some(q) = num("trailing_questions") {
            if q >= 2.0 {
                add(
                    "belief:ask_when_needed".into(),
                    "limit trailing questions to at most one relevant question",
                    0.45 + 0.1 * q,
                    &["trailing_questions"],
                );
            }
        }

        if flag("code_without_notes") {
            add(
                "format:code_with_min_notes".into(),
                "accompany code blocks with a short note on what the code does",
                0.5,
                &["code_without_notes"],
            );
        }

        if let Some(kv) = num("structured_kv_lines") {
            if kv >= f64::from(self.cfg.kv_min) {
                add(
                    "format:use_table_when_structured".into(),
                    "present long key-value listings as a table",
                    0.35 + 0.05 * kv,
                    &["structured_kv_lines"],
                );
            }
        }

        if let (Some(user_lang), Some(reply_lang)) = (text("user_lang"), text("reply_lang")) {
            if !user_lang.is_empty() && !user_lang.eq_ignore_ascii_case(reply_lang) {
                let lang = user_lang.to_ascii_lowercase();
                add(
                    format!("style:mirror_user_language_{lang}"),
                    &format!("reply in the user's language ({lang})"),
                    0.75,
                    &["user_lang", "reply_lang"],
                );
            }
        }

        if flag("mixed_number_locale") {
            add(
                "style:respect_user_locale".into(),
                "format numbers and dates according to the user's locale",
                0.5,
                &["mixed_number_locale"],
            );
        }

        tracing::debug!(turn_id = %snap.turn_id, candidates = out.len(), "candidates generated");
        Ok(out)
    }
}

fn candidate_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("cand_{}", &hex[..8])
}
