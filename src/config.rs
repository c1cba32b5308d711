use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};
use crate::snapshot::{SignalSchema, default_schema};

#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub ranker: RankerConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub eviction: EvictionConfig,
    #[serde(default)]
    pub logbook: LogbookConfig,
    #[serde(default = "default_schema")]
    pub signals: SignalSchema,
}

impl CoreConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("config.toml");
        let mut cfg = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<CoreConfig>(&text)
                .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))?
        } else {
            tracing::info!(
                "No config file found at {}. Using CoreConfig::default().",
                path.display()
            );
            CoreConfig::default()
        };
        cfg.resolve_paths(root);
        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_paths(&mut self, root: &Path) {
        self.store.path = absolutize(root, &self.store.path);
        self.logbook.path = absolutize(root, &self.logbook.path);
        self.logbook.aggregate = absolutize(root, &self.logbook.aggregate);
    }

    /// Reject configurations the pipeline cannot act on deterministically.
    pub fn validate(&self) -> Result<()> {
        let g = &self.gate;
        if !(0.0..=1.0).contains(&g.accept_threshold) {
            return Err(Error::Config(format!(
                "accept_threshold must be in [0,1], got {}",
                g.accept_threshold
            )));
        }
        if !(0.0..=1.0).contains(&g.conflict_margin) {
            return Err(Error::Config(format!(
                "conflict_margin must be in [0,1], got {}",
                g.conflict_margin
            )));
        }
        if !(0.0..=1.0).contains(&g.ema_alpha) {
            return Err(Error::Config(format!(
                "ema_alpha must be in [0,1], got {}",
                g.ema_alpha
            )));
        }
        if g.min_gap_turns == 0 {
            return Err(Error::Config("min_gap_turns must be >= 1".into()));
        }
        let r = &self.ranker;
        for (name, w) in [
            ("w_recency", r.w_recency),
            ("w_clarity", r.w_clarity),
            ("w_utility", r.w_utility),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::Config(format!("{name} must be >= 0, got {w}")));
            }
        }
        if r.w_recency + r.w_clarity + r.w_utility <= 0.0 {
            return Err(Error::Config("ranker weights must not all be zero".into()));
        }
        if !(0.0..=1.0).contains(&self.eviction.eviction_min_confidence) {
            return Err(Error::Config(format!(
                "eviction_min_confidence must be in [0,1], got {}",
                self.eviction.eviction_min_confidence
            )));
        }
        Ok(())
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            gate: GateConfig::default(),
            ranker: RankerConfig::default(),
            generator: GeneratorConfig::default(),
            store: StoreConfig::default(),
            eviction: EvictionConfig::default(),
            logbook: LogbookConfig::default(),
            signals: default_schema(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// Final ranking score below which the turn's top candidate is rejected.
    #[serde(default = "GateConfig::default_accept_threshold")]
    pub accept_threshold: f64,
    /// A conflicting claim replaces the stored one only when
    /// `candidate.score - existing.confidence >= conflict_margin`.
    #[serde(default = "GateConfig::default_conflict_margin")]
    pub conflict_margin: f64,
    /// EMA factor for reinforcement: `c' = alpha*score + (1-alpha)*c`.
    #[serde(default = "GateConfig::default_ema_alpha")]
    pub ema_alpha: f64,
    /// Minimum turns between two accepted writes. 1 = every turn eligible.
    #[serde(default = "GateConfig::default_min_gap_turns")]
    pub min_gap_turns: u64,
}

impl GateConfig {
    fn default_accept_threshold() -> f64 {
        0.5
    }

    fn default_conflict_margin() -> f64 {
        0.2
    }

    fn default_ema_alpha() -> f64 {
        0.3
    }

    fn default_min_gap_turns() -> u64 {
        1
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            accept_threshold: Self::default_accept_threshold(),
            conflict_margin: Self::default_conflict_margin(),
            ema_alpha: Self::default_ema_alpha(),
            min_gap_turns: Self::default_min_gap_turns(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankerConfig {
    #[serde(default = "RankerConfig::default_w_recency")]
    pub w_recency: f64,
    #[serde(default = "RankerConfig::default_w_clarity")]
    pub w_clarity: f64,
    #[serde(default = "RankerConfig::default_w_utility")]
    pub w_utility: f64,
}

impl RankerConfig {
    fn default_w_recency() -> f64 {
        0.2
    }

    fn default_w_clarity() -> f64 {
        0.3
    }

    fn default_w_utility() -> f64 {
        0.5
    }
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            w_recency: Self::default_w_recency(),
            w_clarity: Self::default_w_clarity(),
            w_utility: Self::default_w_utility(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    /// Hedge-word count at which `style:reduce_hedging` fires.
    #[serde(default = "GeneratorConfig::default_hedge_min")]
    pub hedge_min: u32,
    /// Key-value line count at which `format:use_table_when_structured` fires.
    #[serde(default = "GeneratorConfig::default_kv_min")]
    pub kv_min: u32,
}

impl GeneratorConfig {
    fn default_hedge_min() -> u32 {
        2
    }

    fn default_kv_min() -> u32 {
        3
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            hedge_min: Self::default_hedge_min(),
            kv_min: Self::default_kv_min(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "StoreConfig::default_path")]
    pub path: PathBuf,
}

impl StoreConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("data/self_rules.json")
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvictionConfig {
    /// Retention window in days for never-reinforced, low-confidence rules.
    #[serde(default = "EvictionConfig::default_eviction_age_days")]
    pub eviction_age_days: u32,
    #[serde(default = "EvictionConfig::default_eviction_min_confidence")]
    pub eviction_min_confidence: f64,
}

impl EvictionConfig {
    fn default_eviction_age_days() -> u32 {
        30
    }

    fn default_eviction_min_confidence() -> f64 {
        0.2
    }
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            eviction_age_days: Self::default_eviction_age_days(),
            eviction_min_confidence: Self::default_eviction_min_confidence(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogbookConfig {
    #[serde(default = "LogbookConfig::default_path")]
    pub path: PathBuf,
    #[serde(default = "LogbookConfig::default_aggregate")]
    pub aggregate: PathBuf,
}

impl LogbookConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("logbook")
    }

    fn default_aggregate() -> PathBuf {
        PathBuf::from("logbook.jsonl")
    }
}

impl Default for LogbookConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            aggregate: Self::default_aggregate(),
        }
    }
}

fn absolutize(root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        root.join(value)
    }
}
