// src/services/store.rs
//! MemoryStore: the single authority over persisted self-rules.
//!
//! - One ordered-by-key mapping `key -> RuleRecord`, unique keys.
//! - `confidence`, `version` and `reinforcement_count` change only through
//!   the merge operations here (`create` / `reinforce` / `replace_claim`).
//! - Persistence is one versioned JSON document, saved via temp-file write +
//!   atomic rename so an interrupted save leaves the prior snapshot intact.
//! - Eviction is a deliberate, caller-invoked operation; the gating pipeline
//!   never removes records on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::services::clamp01;
use crate::utils::fsio::write_atomic;

/// Format version written into every persisted document. `load()` refuses
/// documents from a newer format instead of guessing at their layout.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Newest evidence entries kept per rule.
const MAX_EVIDENCE: usize = 5;

/// Audit pointer for one acceptance. Holds a content digest of the turn's
/// excerpt, never the excerpt text itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub turn_id: String,
    pub ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt_digest: Option<String>,
}

/// A persisted, keyed behavioral claim about the model's own output style.
/// Owned exclusively by [`MemoryStore`]; immutable outside its merge ops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub id: String,
    pub key: String,
    pub claim: String,
    /// Decayed running estimate of utility, always recomputed by the store.
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub last_reinforced_at: DateTime<Utc>,
    pub reinforcement_count: u32,
    /// Monotonic; incremented only when the claim text changes.
    pub version: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

/// Read-only projection handed to the external ontograph exporter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleExport {
    pub key: String,
    pub claim: String,
    pub confidence: f64,
    pub version: u32,
}

#[derive(Serialize, Deserialize)]
struct StoreDoc {
    format_version: u32,
    rules: BTreeMap<String, RuleRecord>,
}

#[derive(Debug)]
pub struct MemoryStore {
    path: PathBuf,
    rules: BTreeMap<String, RuleRecord>,
}

impl MemoryStore {
    /// Load the current snapshot, or an empty store if none exists.
    ///
    /// Fails with `Error::CorruptStore` on malformed persisted state — the
    /// store never auto-repairs by silently dropping rules.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                rules: BTreeMap::new(),
            });
        }
        let text = fs::read_to_string(&path)?;
        let doc: StoreDoc = serde_json::from_str(&text)
            .map_err(|e| Error::corrupt_store(&path, format!("malformed JSON: {e}")))?;
        if doc.format_version > STORE_FORMAT_VERSION {
            return Err(Error::corrupt_store(
                &path,
                format!(
                    "format_version {} is newer than supported {}",
                    doc.format_version, STORE_FORMAT_VERSION
                ),
            ));
        }
        for (key, rec) in &doc.rules {
            if key != &rec.key {
                return Err(Error::corrupt_store(
                    &path,
                    format!("map key '{key}' does not match record key '{}'", rec.key),
                ));
            }
            if !rec.confidence.is_finite() || !(0.0..=1.0).contains(&rec.confidence) {
                return Err(Error::corrupt_store(
                    &path,
                    format!("record '{key}' has confidence {} outside [0,1]", rec.confidence),
                ));
            }
            if rec.reinforcement_count < 1 || rec.version < 1 {
                return Err(Error::corrupt_store(
                    &path,
                    format!("record '{key}' has non-positive count or version"),
                ));
            }
        }
        Ok(Self {
            path,
            rules: doc.rules,
        })
    }

    /// Flush the in-memory snapshot to durable storage (atomic checkpoint).
    pub fn save(&self) -> Result<()> {
        let doc = StoreDoc {
            format_version: STORE_FORMAT_VERSION,
            rules: self.rules.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&doc)
            .map_err(|e| Error::Other(anyhow::anyhow!("serializing store: {e}")))?;
        write_atomic(&self.path, &bytes)?;
        tracing::debug!(path = %self.path.display(), rules = self.rules.len(), "store saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&RuleRecord> {
        self.rules.get(key)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Ordered-by-key enumeration of all records.
    pub fn records(&self) -> impl Iterator<Item = &RuleRecord> {
        self.rules.values()
    }

    /// Read-only enumeration for downstream graph construction.
    pub fn export(&self) -> Vec<RuleExport> {
        self.rules
            .values()
            .map(|r| RuleExport {
                key: r.key.clone(),
                claim: r.claim.clone(),
                confidence: r.confidence,
                version: r.version,
            })
            .collect()
    }

    /// Insert or overwrite a record verbatim. Maintenance/tooling only; the
    /// gating path goes through the merge operations below.
    pub fn upsert(&mut self, record: RuleRecord) {
        self.rules.insert(record.key.clone(), record);
    }

    /// First acceptance of a key: version 1, reinforcement_count 1,
    /// confidence = accepted score.
    pub fn create(
        &mut self,
        key: &str,
        claim: &str,
        score: f64,
        tags: Vec<String>,
        evidence: Option<Evidence>,
        now: DateTime<Utc>,
    ) -> &RuleRecord {
        let rec = RuleRecord {
            id: rule_id(),
            key: key.to_string(),
            claim: claim.to_string(),
            confidence: clamp01(score),
            created_at: now,
            last_reinforced_at: now,
            reinforcement_count: 1,
            version: 1,
            tags,
            evidence: evidence.into_iter().collect(),
        };
        self.rules.insert(key.to_string(), rec);
        &self.rules[key]
    }

    /// Repeated acceptance of the same key with an identical claim.
    /// Confidence moves by exponential moving average; version is unchanged.
    pub fn reinforce(
        &mut self,
        key: &str,
        score: f64,
        alpha: f64,
        tags: Vec<String>,
        evidence: Option<Evidence>,
        now: DateTime<Utc>,
    ) -> Result<&RuleRecord> {
        let rec = self
            .rules
            .get_mut(key)
            .ok_or_else(|| anyhow::anyhow!("reinforce on unknown key '{key}'"))?;
        rec.confidence = clamp01(alpha * score + (1.0 - alpha) * rec.confidence);
        rec.reinforcement_count = rec.reinforcement_count.saturating_add(1);
        rec.last_reinforced_at = now;
        for t in tags {
            if !rec.tags.contains(&t) {
                rec.tags.push(t);
            }
        }
        push_evidence(&mut rec.evidence, evidence);
        Ok(rec)
    }

    /// Conflict resolution in the candidate's favor: the claim text is
    /// replaced, version increments, confidence and count start over.
    pub fn replace_claim(
        &mut self,
        key: &str,
        claim: &str,
        score: f64,
        tags: Vec<String>,
        evidence: Option<Evidence>,
        now: DateTime<Utc>,
    ) -> Result<&RuleRecord> {
        let rec = self
            .rules
            .get_mut(key)
            .ok_or_else(|| anyhow::anyhow!("replace_claim on unknown key '{key}'"))?;
        rec.claim = claim.to_string();
        rec.confidence = clamp01(score);
        rec.reinforcement_count = 1;
        rec.version += 1;
        rec.last_reinforced_at = now;
        rec.tags = tags;
        push_evidence(&mut rec.evidence, evidence);
        Ok(rec)
    }

    /// Explicit, caller-invoked removal of records matching a predicate.
    /// Returns the removed records, ordered by key.
    pub fn evict<F>(&mut self, predicate: F) -> Vec<RuleRecord>
    where
        F: Fn(&RuleRecord) -> bool,
    {
        let doomed: Vec<String> = self
            .rules
            .values()
            .filter(|r| predicate(r))
            .map(|r| r.key.clone())
            .collect();
        doomed
            .iter()
            .filter_map(|k| self.rules.remove(k))
            .collect()
    }
}

fn push_evidence(list: &mut Vec<Evidence>, evidence: Option<Evidence>) {
    if let Some(ev) = evidence {
        list.push(ev);
        if list.len() > MAX_EVIDENCE {
            let excess = list.len() - MAX_EVIDENCE;
            list.drain(..excess);
        }
    }
}

fn rule_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("rule_{}", &hex[..8])
}
