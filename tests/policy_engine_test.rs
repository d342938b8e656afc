use serde_json::{json, Value};

use guardian_supervisor::models::{Decision, PolicyRule};
use guardian_supervisor::policy::decide;
use guardian_supervisor::scorer::RiskSignal;

fn doc() -> Value {
    json!({
        "action": {"type": "http.request", "target": "https://example.com"},
        "context": {"data_classification": []}
    })
}

fn rule(policy_id: &str, priority: i64, effect: &str, boost: f64) -> PolicyRule {
    serde_json::from_value(json!({
        "policy_id": policy_id,
        "priority": priority,
        "match": {"action.type": "http.request"},
        "effect": effect,
        "risk_boost": boost,
        "message": format!("{policy_id} fired")
    }))
    .unwrap()
}

fn signal(score: f64, rewrite: Option<Value>) -> RiskSignal {
    RiskSignal {
        score,
        reasons: vec![],
        rewrite,
    }
}

#[test]
fn adding_a_higher_ranked_hit_never_lowers_the_decision() {
    let base = vec![rule("warn", 10, "REQUIRE_APPROVAL", 0.1)];
    let verdict_before = decide(&doc(), &base, None);

    let mut extended = base.clone();
    extended.push(rule("hard_block", 5, "BLOCK", 0.0));
    let verdict_after = decide(&doc(), &extended, None);

    assert!(verdict_after.decision >= verdict_before.decision);
    assert_eq!(verdict_after.decision, Decision::Block);
}

#[test]
fn lower_ranked_hits_never_demote() {
    let rules = vec![
        rule("block_it", 100, "BLOCK", 0.0),
        rule("allow_it", 200, "ALLOW", 0.0),
    ];

    let verdict = decide(&doc(), &rules, None);
    assert_eq!(verdict.decision, Decision::Block);
}

#[test]
fn risk_boosts_accumulate_across_hits() {
    let rules = vec![
        rule("a", 10, "ALLOW", 0.2),
        rule("b", 20, "ALLOW", 0.3),
    ];

    let verdict = decide(&doc(), &rules, None);
    assert_eq!(verdict.risk.score, 0.5);
    assert_eq!(verdict.policy_hits, vec!["b".to_string(), "a".to_string()]);
}

#[test]
fn block_threshold_is_exclusive() {
    let verdict = decide(&doc(), &[], Some(&signal(0.85, None)));
    assert_eq!(verdict.decision, Decision::RequireApproval);

    let verdict = decide(&doc(), &[], Some(&signal(0.851, None)));
    assert_eq!(verdict.decision, Decision::Block);
}

#[test]
fn approval_threshold_is_exclusive() {
    let verdict = decide(&doc(), &[], Some(&signal(0.60, None)));
    assert_eq!(verdict.decision, Decision::Allow);

    let verdict = decide(&doc(), &[], Some(&signal(0.601, None)));
    assert_eq!(verdict.decision, Decision::RequireApproval);
}

#[test]
fn rewrite_band_needs_both_score_and_rewrite() {
    let rewrite = json!({"body": "[REDACTED]"});

    let verdict = decide(&doc(), &[], Some(&signal(0.30, Some(rewrite.clone()))));
    assert_eq!(verdict.decision, Decision::Allow);

    let verdict = decide(&doc(), &[], Some(&signal(0.31, Some(rewrite.clone()))));
    assert_eq!(verdict.decision, Decision::Rewrite);

    let verdict = decide(&doc(), &[], Some(&signal(0.60, Some(rewrite))));
    assert_eq!(verdict.decision, Decision::Rewrite);
}

#[test]
fn policy_hit_effect_beats_lower_threshold_band() {
    // a REQUIRE_APPROVAL hit stays even though the score only reaches the
    // rewrite band
    let rules = vec![rule("needs_review", 10, "REQUIRE_APPROVAL", 0.0)];
    let verdict = decide(
        &doc(),
        &rules,
        Some(&signal(0.45, Some(json!({"body": "x"})))),
    );

    assert_eq!(verdict.decision, Decision::RequireApproval);
    assert!(verdict.rewrite.is_none());
}

#[test]
fn hit_messages_become_reasons() {
    let rules = vec![rule("noisy", 10, "ALLOW", 0.0)];
    let verdict = decide(&doc(), &rules, None);
    assert_eq!(verdict.risk.reasons, vec!["noisy fired".to_string()]);
}

#[test]
fn missing_paths_resolve_to_null_not_error() {
    let rules = vec![serde_json::from_value::<PolicyRule>(json!({
        "policy_id": "matches_nothing",
        "match": {"context.workspace.owner": "alice"},
        "effect": "BLOCK"
    }))
    .unwrap()];

    let verdict = decide(&doc(), &rules, None);
    assert_eq!(verdict.decision, Decision::Allow);
}
