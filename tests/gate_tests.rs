use chrono::Utc;
use tempfile::tempdir;

use selfrule_core::config::GateConfig;
use selfrule_core::services::{
    Disposition, GateOutcome, InsightCandidate, MemoryStore, RankedCandidate, RejectReason,
    WriteGate,
};
use selfrule_core::snapshot::FeatureSnapshot;

fn ranked(key: &str, claim: &str, score: f64) -> RankedCandidate {
    RankedCandidate {
        candidate: InsightCandidate {
            id: format!("cand_{key}"),
            key: key.to_string(),
            claim: claim.to_string(),
            score,
            source_turn_id: "t".to_string(),
            signals: vec!["sig".to_string()],
        },
        recency: 1.0,
        clarity: 1.0,
        utility: score,
        score,
    }
}

fn snapshot(turn_id: &str) -> FeatureSnapshot {
    FeatureSnapshot::new(turn_id, Utc::now()).with_excerpt("audit excerpt")
}

fn fresh_store(dir: &tempfile::TempDir) -> MemoryStore {
    MemoryStore::load(dir.path().join("rules.json")).expect("load empty")
}

#[test]
fn top_candidate_above_threshold_creates_rule() {
    let dir = tempdir().expect("tempdir");
    let mut store = fresh_store(&dir);
    let mut gate = WriteGate::new(GateConfig::default());

    let out = gate
        .resolve(&snapshot("t1"), &[ranked("style:shorter_blocks", "be concise", 0.7)], &mut store)
        .expect("resolve");

    match out {
        GateOutcome::Accepted {
            key,
            disposition,
            confidence,
            version,
        } => {
            assert_eq!(key, "style:shorter_blocks");
            assert_eq!(disposition, Disposition::Created);
            assert!((confidence - 0.7).abs() < 1e-9);
            assert_eq!(version, 1);
        }
        other => panic!("expected accept, got {other:?}"),
    }
    let rec = store.get("style:shorter_blocks").expect("record");
    assert_eq!(rec.reinforcement_count, 1);
    assert_eq!(rec.version, 1);
    // Evidence carries a digest, never the excerpt itself.
    assert_eq!(rec.evidence.len(), 1);
    assert!(rec.evidence[0].excerpt_digest.is_some());
}

#[test]
fn below_threshold_rejects_without_mutation() {
    let dir = tempdir().expect("tempdir");
    let mut store = fresh_store(&dir);
    let mut gate = WriteGate::new(GateConfig::default());

    let out = gate
        .resolve(&snapshot("t1"), &[ranked("style:x", "claim", 0.49)], &mut store)
        .expect("resolve");
    assert!(matches!(
        out,
        GateOutcome::Rejected(RejectReason::BelowThreshold { .. })
    ));
    assert!(store.is_empty());
}

#[test]
fn no_candidates_rejects() {
    let dir = tempdir().expect("tempdir");
    let mut store = fresh_store(&dir);
    let mut gate = WriteGate::new(GateConfig::default());
    let out = gate.resolve(&snapshot("t1"), &[], &mut store).expect("resolve");
    assert!(matches!(out, GateOutcome::Rejected(RejectReason::NoCandidates)));
}

#[test]
fn identical_claim_reinforces_with_ema() {
    let dir = tempdir().expect("tempdir");
    let mut store = fresh_store(&dir);
    let mut gate = WriteGate::new(GateConfig::default());

    gate.resolve(&snapshot("t1"), &[ranked("style:k", "same claim", 0.7)], &mut store)
        .expect("first");
    let out = gate
        .resolve(&snapshot("t2"), &[ranked("style:k", "same claim", 0.6)], &mut store)
        .expect("second");

    // 0.3*0.6 + 0.7*0.7 = 0.67
    match out {
        GateOutcome::Accepted {
            disposition,
            confidence,
            version,
            ..
        } => {
            assert_eq!(disposition, Disposition::Reinforced);
            assert!((confidence - 0.67).abs() < 1e-9, "got {confidence}");
            assert_eq!(version, 1);
        }
        other => panic!("expected reinforce, got {other:?}"),
    }
    let rec = store.get("style:k").expect("record");
    assert_eq!(rec.reinforcement_count, 2);
    assert_eq!(rec.version, 1);
}

#[test]
fn conflicting_claim_replaces_only_past_margin() {
    let dir = tempdir().expect("tempdir");
    let mut store = fresh_store(&dir);
    let mut gate = WriteGate::new(GateConfig::default());

    gate.resolve(&snapshot("t1"), &[ranked("style:k", "old claim", 0.7)], &mut store)
        .expect("create");
    gate.resolve(&snapshot("t2"), &[ranked("style:k", "old claim", 0.6)], &mut store)
        .expect("reinforce"); // confidence now 0.67

    // 0.9 - 0.67 = 0.23 >= 0.2 -> replacement
    let out = gate
        .resolve(&snapshot("t3"), &[ranked("style:k", "new claim", 0.9)], &mut store)
        .expect("conflict");
    match out {
        GateOutcome::Accepted {
            disposition,
            confidence,
            version,
            ..
        } => {
            assert_eq!(disposition, Disposition::Replaced);
            assert!((confidence - 0.9).abs() < 1e-9);
            assert_eq!(version, 2);
        }
        other => panic!("expected replace, got {other:?}"),
    }
    let rec = store.get("style:k").expect("record");
    assert_eq!(rec.claim, "new claim");
    assert_eq!(rec.reinforcement_count, 1);
}

#[test]
fn conflicting_claim_inside_margin_is_rejected_store_unchanged() {
    let dir = tempdir().expect("tempdir");
    let mut store = fresh_store(&dir);
    let mut gate = WriteGate::new(GateConfig::default());

    gate.resolve(&snapshot("t1"), &[ranked("style:k", "old claim", 0.7)], &mut store)
        .expect("create");
    let before = store.get("style:k").expect("record").clone();

    // 0.8 - 0.7 = 0.1 < 0.2 -> existing rule wins
    let out = gate
        .resolve(&snapshot("t2"), &[ranked("style:k", "new claim", 0.8)], &mut store)
        .expect("conflict");
    assert!(matches!(
        out,
        GateOutcome::Rejected(RejectReason::ConflictRejected { .. })
    ));
    assert_eq!(store.get("style:k").expect("record"), &before);
}

#[test]
fn only_top_ranked_candidate_is_ever_evaluated() {
    let dir = tempdir().expect("tempdir");
    let mut store = fresh_store(&dir);
    let mut gate = WriteGate::new(GateConfig::default());

    // Both clear the threshold; only the 0.8 one may land.
    let out = gate
        .resolve(
            &snapshot("t1"),
            &[ranked("style:top", "a", 0.8), ranked("style:second", "b", 0.6)],
            &mut store,
        )
        .expect("resolve");
    assert!(out.is_accepted());
    assert!(store.get("style:top").is_some());
    assert!(store.get("style:second").is_none());
    assert_eq!(store.len(), 1);
}

#[test]
fn runner_up_is_discarded_even_when_top_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let mut store = fresh_store(&dir);
    let mut gate = WriteGate::new(GateConfig::default());

    // Seed a conflicting incumbent for the top key.
    gate.resolve(&snapshot("t1"), &[ranked("style:top", "incumbent", 0.9)], &mut store)
        .expect("seed");

    // Top conflicts inside the margin -> rejected. The 0.6 runner-up would
    // clear the threshold on a fresh key but must never be considered.
    let out = gate
        .resolve(
            &snapshot("t2"),
            &[ranked("style:top", "challenger", 0.95), ranked("style:fresh", "b", 0.6)],
            &mut store,
        )
        .expect("resolve");
    assert!(matches!(
        out,
        GateOutcome::Rejected(RejectReason::ConflictRejected { .. })
    ));
    assert!(store.get("style:fresh").is_none());
    assert_eq!(store.len(), 1);
}

#[test]
fn min_gap_turns_spaces_accepted_writes() {
    let dir = tempdir().expect("tempdir");
    let mut store = fresh_store(&dir);
    let cfg = GateConfig {
        min_gap_turns: 3,
        ..GateConfig::default()
    };
    let mut gate = WriteGate::new(cfg);

    let out1 = gate
        .resolve(&snapshot("t1"), &[ranked("a:one", "c", 0.9)], &mut store)
        .expect("t1");
    assert!(out1.is_accepted());

    for (turn, key) in [("t2", "a:two"), ("t3", "a:three")] {
        let out = gate
            .resolve(&snapshot(turn), &[ranked(key, "c", 0.9)], &mut store)
            .expect(turn);
        assert!(
            matches!(out, GateOutcome::Rejected(RejectReason::TooSoon { .. })),
            "turn {turn} should be too soon"
        );
    }

    let out4 = gate
        .resolve(&snapshot("t4"), &[ranked("a:four", "c", 0.9)], &mut store)
        .expect("t4");
    assert!(out4.is_accepted());
    assert_eq!(store.len(), 2);
}
