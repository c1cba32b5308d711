use selfrule_core::config::RankerConfig;
use selfrule_core::services::{InsightCandidate, UtilityRanker};

fn candidate(key: &str, claim: &str, score: f64) -> InsightCandidate {
    InsightCandidate {
        id: format!("cand_{key}"),
        key: key.to_string(),
        claim: claim.to_string(),
        score,
        source_turn_id: "t1".to_string(),
        signals: vec![],
    }
}

fn weights(w_recency: f64, w_clarity: f64, w_utility: f64) -> RankerConfig {
    RankerConfig {
        w_recency,
        w_clarity,
        w_utility,
    }
}

#[test]
fn final_score_is_normalized_by_weight_sum() {
    // recency = clarity = 1.0, utility = 0.5, weights (1, 1, 2):
    // (1 + 1 + 2*0.5) / 4 = 0.75
    let ranker = UtilityRanker::new(weights(1.0, 1.0, 2.0));
    let ranked = ranker.rank(vec![candidate("a:one", "short direct claim", 0.5)]);
    assert_eq!(ranked.len(), 1);
    assert!((ranked[0].score - 0.75).abs() < 1e-9, "got {}", ranked[0].score);
    assert_eq!(ranked[0].recency, 1.0);
    assert_eq!(ranked[0].clarity, 1.0);
}

#[test]
fn utility_only_weights_pass_raw_score_through() {
    let ranker = UtilityRanker::new(weights(0.0, 0.0, 1.0));
    let ranked = ranker.rank(vec![candidate("a:one", "whatever maybe perhaps", 0.62)]);
    assert!((ranked[0].score - 0.62).abs() < 1e-9);
}

#[test]
fn sorted_descending_by_score() {
    let ranker = UtilityRanker::new(weights(0.0, 0.0, 1.0));
    let ranked = ranker.rank(vec![
        candidate("a:low", "x", 0.2),
        candidate("b:high", "x", 0.9),
        candidate("c:mid", "x", 0.5),
    ]);
    let keys: Vec<&str> = ranked.iter().map(|r| r.candidate.key.as_str()).collect();
    assert_eq!(keys, vec!["b:high", "c:mid", "a:low"]);
}

#[test]
fn ties_break_by_lexicographic_key() {
    let ranker = UtilityRanker::new(weights(0.0, 0.0, 1.0));
    let ranked = ranker.rank(vec![
        candidate("style:zeta", "same claim", 0.5),
        candidate("belief:alpha", "same claim", 0.5),
        candidate("format:mid", "same claim", 0.5),
    ]);
    let keys: Vec<&str> = ranked.iter().map(|r| r.candidate.key.as_str()).collect();
    assert_eq!(keys, vec!["belief:alpha", "format:mid", "style:zeta"]);
}

#[test]
fn hedge_terms_in_claim_reduce_clarity() {
    let ranker = UtilityRanker::new(weights(0.0, 1.0, 0.0));
    let ranked = ranker.rank(vec![
        candidate("a:vague", "maybe this could perhaps help", 0.9),
        candidate("b:direct", "always structure long answers", 0.9),
    ]);
    // The direct claim must rank first despite equal utility.
    assert_eq!(ranked[0].candidate.key, "b:direct");
    assert_eq!(ranked[0].clarity, 1.0);
    // Two hedge terms -> 0.3 penalty.
    assert!((ranked[1].clarity - 0.7).abs() < 1e-9, "got {}", ranked[1].clarity);
}

#[test]
fn overlong_claims_pay_a_length_penalty() {
    let ranker = UtilityRanker::new(weights(0.0, 1.0, 0.0));
    let long_claim = "x".repeat(520);
    let ranked = ranker.rank(vec![candidate("a:long", &long_claim, 0.9)]);
    // (520 - 120) / 400 = 1.0 penalty -> clarity floors at 0.
    assert_eq!(ranked[0].clarity, 0.0);
    assert_eq!(ranked[0].score, 0.0);
}
