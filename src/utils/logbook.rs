// src/utils/logbook.rs
//! Append-only JSONL observability log. Best-effort: a logbook write failure
//! must never fail the turn that produced it, so callers usually ignore the
//! Result.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::{fs, io::Write, path::Path};

#[derive(Serialize)]
struct ActionLine<'a> {
    ts: String,
    event: &'static str,
    agent: &'a str,
    action: &'a str,
    severity: &'a str,
    details: &'a Value,
}

/// Record a component action (accept/reject decisions, saves, evictions)
/// into `<base>/actions.jsonl`.
pub fn record_action(
    base: &Path,
    agent: &str,
    action: &str,
    details: &Value,
    severity: &str,
) -> Result<()> {
    let line = ActionLine {
        ts: chrono::Utc::now().to_rfc3339(),
        event: "action",
        agent,
        action,
        severity,
        details,
    };
    append_jsonl(&base.join("actions.jsonl"), &line)
}

/// Append an arbitrary event to the aggregate logbook file.
pub fn emit_event(aggregate: &Path, event: &str, data: Value, ts: &str) -> Result<()> {
    let line = serde_json::json!({
        "timestamp": ts,
        "event": event,
        "data": data
    });
    append_jsonl(aggregate, &line)
}

fn append_jsonl<S: Serialize>(path: &Path, val: &S) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(val)?;
    let mut f = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{}", json)?;
    Ok(())
}
