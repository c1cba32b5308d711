// src/snapshot.rs
//! Per-turn observation types and the declared signal schema.
//!
//! A `FeatureSnapshot` is produced by an external feature extractor once per
//! assistant turn. The core makes no assumption about how signals were
//! computed — only that their names and types match the configured schema.
//! Snapshots are discarded after the turn is processed; the raw excerpt is
//! audit-only and never persisted verbatim (the store keeps a blake3 digest).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{Error, Result};

/// Upper bound on the audit excerpt carried by a snapshot.
pub const MAX_EXCERPT_CHARS: usize = 2000;

/// A single named observation value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl SignalValue {
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalValue::Number(_) => SignalKind::Number,
            SignalValue::Bool(_) => SignalKind::Bool,
            SignalValue::Text(_) => SignalKind::Text,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            SignalValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SignalValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SignalValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Declared type of a signal in the configuration schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Number,
    Bool,
    Text,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Number => "number",
            SignalKind::Bool => "bool",
            SignalKind::Text => "text",
        }
    }
}

/// One entry of the configuration-declared schema `{signal_name: type}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSpec {
    pub kind: SignalKind,
    #[serde(default)]
    pub required: bool,
}

impl SignalSpec {
    pub fn required(kind: SignalKind) -> Self {
        Self { kind, required: true }
    }

    pub fn optional(kind: SignalKind) -> Self {
        Self { kind, required: false }
    }
}

pub type SignalSchema = BTreeMap<String, SignalSpec>;

/// A structured observation of one assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub turn_id: String,
    pub ts: DateTime<Utc>,
    pub signals: BTreeMap<String, SignalValue>,
    /// Bounded raw-text excerpt, for audit trails only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl FeatureSnapshot {
    pub fn new(turn_id: impl Into<String>, ts: DateTime<Utc>) -> Self {
        Self {
            turn_id: turn_id.into(),
            ts,
            signals: BTreeMap::new(),
            excerpt: None,
        }
    }

    pub fn with_signal(mut self, name: impl Into<String>, value: SignalValue) -> Self {
        self.signals.insert(name.into(), value);
        self
    }

    /// Attach an audit excerpt, truncated to [`MAX_EXCERPT_CHARS`].
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        let e: String = excerpt.into();
        self.excerpt = Some(e.chars().take(MAX_EXCERPT_CHARS).collect());
        self
    }

    /// Check this snapshot against the declared schema.
    ///
    /// Rejects (as `Error::InvalidSnapshot`):
    /// - an empty `turn_id`,
    /// - a required signal that is absent,
    /// - a declared signal carried with the wrong type,
    /// - a signal name the schema does not declare,
    /// - an excerpt over the bound.
    pub fn validate(&self, schema: &SignalSchema) -> Result<()> {
        if self.turn_id.trim().is_empty() {
            return Err(Error::invalid_snapshot("empty turn_id"));
        }
        for (name, spec) in schema {
            match self.signals.get(name) {
                None if spec.required => {
                    return Err(Error::invalid_snapshot(format!(
                        "required signal '{name}' is absent"
                    )));
                }
                Some(v) if v.kind() != spec.kind => {
                    return Err(Error::invalid_snapshot(format!(
                        "signal '{name}' has type {}, schema declares {}",
                        v.kind().as_str(),
                        spec.kind.as_str()
                    )));
                }
                _ => {}
            }
        }
        for name in self.signals.keys() {
            if !schema.contains_key(name) {
                return Err(Error::invalid_snapshot(format!(
                    "signal '{name}' is not declared in the schema"
                )));
            }
        }
        if let Some(e) = &self.excerpt {
            if e.chars().count() > MAX_EXCERPT_CHARS {
                return Err(Error::invalid_snapshot(format!(
                    "excerpt exceeds {MAX_EXCERPT_CHARS} chars"
                )));
            }
        }
        Ok(())
    }

    /// Content digest of the audit excerpt, if any. This is the only form in
    /// which excerpt text may reach the store.
    pub fn excerpt_digest(&self) -> Option<String> {
        self.excerpt
            .as_ref()
            .map(|e| blake3::hash(e.as_bytes()).to_hex().to_string())
    }
}

/// Default declared schema covering the built-in detectors.
pub fn default_schema() -> SignalSchema {
    let mut m = SignalSchema::new();
    m.insert("reply_length".into(), SignalSpec::required(SignalKind::Number));
    m.insert("max_length".into(), SignalSpec::required(SignalKind::Number));
    m.insert("hedge_count".into(), SignalSpec::optional(SignalKind::Number));
    m.insert("tail_invite".into(), SignalSpec::optional(SignalKind::Bool));
    m.insert("apology".into(), SignalSpec::optional(SignalKind::Bool));
    m.insert(
        "trailing_questions".into(),
        SignalSpec::optional(SignalKind::Number),
    );
    m.insert(
        "code_without_notes".into(),
        SignalSpec::optional(SignalKind::Bool),
    );
    m.insert(
        "structured_kv_lines".into(),
        SignalSpec::optional(SignalKind::Number),
    );
    m.insert("user_lang".into(), SignalSpec::optional(SignalKind::Text));
    m.insert("reply_lang".into(), SignalSpec::optional(SignalKind::Text));
    m.insert(
        "mixed_number_locale".into(),
        SignalSpec::optional(SignalKind::Bool),
    );
    m
}
