// src/commands/init.rs
//! Idempotent root-directory initialization: data and logbook directories,
//! a seeded config.toml, and the logbook JSONL files. No process-global
//! state — the caller owns the report and the config it loads afterwards.

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::utils::fsio::write_atomic;

#[derive(Debug, Clone)]
pub struct InitReport {
    pub root: PathBuf,
    pub created: Vec<String>,
    pub existed: Vec<String>,
}

/// Ensure the on-disk layout under `root` exists (idempotent, safe to call
/// often).
pub fn ensure_initialized(root: &Path) -> Result<InitReport> {
    let root = root.to_path_buf();
    let mut created = Vec::new();
    let mut existed = Vec::new();

    ensure_dir(&root, "", &mut created, &mut existed)?;
    ensure_dir(&root, "data", &mut created, &mut existed)?;
    ensure_dir(&root, "logbook", &mut created, &mut existed)?;

    ensure_file(
        &root,
        "config.toml",
        Some(DEFAULT_CONFIG_TOML),
        &mut created,
        &mut existed,
    )?;

    initialize_logbook_files(&root, &mut created, &mut existed)?;

    Ok(InitReport {
        root,
        created,
        existed,
    })
}

fn ensure_dir(
    base: &Path,
    rel: &str,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = if rel.is_empty() {
        base.to_path_buf()
    } else {
        base.join(rel)
    };
    if p.exists() {
        existed.push(if rel.is_empty() { ".".to_string() } else { rel.to_string() });
        return Ok(());
    }
    fs::create_dir_all(&p).with_context(|| format!("create_dir_all({:?})", p))?;
    created.push(if rel.is_empty() { ".".to_string() } else { rel.to_string() });
    Ok(())
}

fn ensure_file(
    base: &Path,
    rel_file: &str,
    content_if_absent: Option<&str>,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = base.join(rel_file);
    if p.exists() {
        existed.push(rel_file.to_string());
        return Ok(());
    }
    write_atomic(&p, content_if_absent.unwrap_or("").as_bytes())?;
    created.push(rel_file.to_string());
    Ok(())
}

fn ensure_seeded_jsonl(
    dir: &Path,
    file: &str,
    init_line: &str,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = dir.join(file);
    if !p.exists() {
        ensure_file(dir, file, Some(&(init_line.to_string() + "\n")), created, existed)?;
        return Ok(());
    }
    existed.push(file.to_string());
    // If exists but empty, seed it
    if fs::metadata(&p)?.len() == 0 {
        let mut f = OpenOptions::new().append(true).open(&p)?;
        f.write_all(init_line.as_bytes())?;
        f.write_all(b"\n")?;
    }
    Ok(())
}

fn initialize_logbook_files(
    root: &Path,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let ts = Utc::now().to_rfc3339();
    let init_event = format!(
        r#"{{"timestamp":"{}","event":"system_init","data":{{"format_version":1}}}}"#,
        ts
    );

    ensure_seeded_jsonl(root, "logbook.jsonl", &init_event, created, existed)?;

    let log_dir = root.join("logbook");
    ensure_seeded_jsonl(&log_dir, "actions.jsonl", &init_event, created, existed)?;
    Ok(())
}

// ---------- defaults ----------

const DEFAULT_CONFIG_TOML: &str = r#"[gate]
accept_threshold = 0.5
conflict_margin = 0.2
ema_alpha = 0.3
min_gap_turns = 1

[ranker]
w_recency = 0.2
w_clarity = 0.3
w_utility = 0.5

[generator]
hedge_min = 2
kv_min = 3

[store]
path = "data/self_rules.json"

[eviction]
eviction_age_days = 30
eviction_min_confidence = 0.2

[logbook]
path = "logbook"
aggregate = "logbook.jsonl"

# Declared signal schema: {signal_name: type}. Snapshots carrying signals
# outside this schema, or missing a required one, are rejected.
[signals.reply_length]
kind = "number"
required = true

[signals.max_length]
kind = "number"
required = true

[signals.hedge_count]
kind = "number"

[signals.tail_invite]
kind = "bool"

[signals.apology]
kind = "bool"

[signals.trailing_questions]
kind = "number"

[signals.code_without_notes]
kind = "bool"

[signals.structured_kv_lines]
kind = "number"

[signals.user_lang]
kind = "text"

[signals.reply_lang]
kind = "text"

[signals.mixed_number_locale]
kind = "bool"
"#;
