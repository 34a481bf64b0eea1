//! Property-based tests for the evaluation engine

use super::*;
use proptest::prelude::*;
use serde_json::Value;

fn arb_action() -> impl Strategy<Value = CandidateAction> {
    (0..MODIFIERS.len(), 0..BASE_TEMPLATES.len())
        .prop_map(|(m, b)| CandidateAction::new(format!("{}, {}", MODIFIERS[m], BASE_TEMPLATES[b])))
}

fn arb_keywords() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(
        prop_oneof![
            Just("detail".to_string()),
            Just("feedback".to_string()),
            Just("GENTLY".to_string()),
            Just("refund".to_string()),
            "[a-z]{3,8}",
        ],
        0..4,
    )
}

/// Keywords found in the action text, counting repeats in the goal list
fn matches(action: &CandidateAction, keywords: &[String]) -> usize {
    let text = action.text.to_lowercase();
    keywords
        .iter()
        .filter(|k| text.contains(&k.to_lowercase()))
        .count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Every rollout mean lies in [0, 50) plus 5 per matched keyword
    #[test]
    fn prop_mean_bounded_by_steps_and_bonus(
        candidates in proptest::collection::vec(arb_action(), 1..6),
        keywords in arb_keywords(),
        rollouts in 1usize..8
    ) {
        let goals = Goals::new(keywords.clone());
        let outcome = ActionEvaluator::new(UniformEstimator)
            .evaluate(&Value::Null, &goals, &candidates, rollouts)
            .unwrap();

        for detail in &outcome.details {
            #[allow(clippy::cast_precision_loss)]
            let bonus = KEYWORD_BONUS * matches(&detail.action, &keywords) as f64;
            #[allow(clippy::cast_precision_loss)]
            let ceiling = STEPS as f64 * MAX_STEP_IMPACT;
            prop_assert!(detail.mean >= bonus - 1e-9, "mean {} below bonus {}", detail.mean, bonus);
            prop_assert!(detail.mean < ceiling + bonus, "mean {} above {}", detail.mean, ceiling + bonus);
        }
    }

    // The reported best is the first candidate holding the maximal mean
    #[test]
    fn prop_best_is_first_maximum(
        candidates in proptest::collection::vec(arb_action(), 1..8),
        keywords in arb_keywords()
    ) {
        let outcome = ActionEvaluator::new(UniformEstimator)
            .evaluate(&Value::Null, &Goals::new(keywords), &candidates, 3)
            .unwrap();

        let max = outcome.details.iter().map(|d| d.mean).fold(f64::NEG_INFINITY, f64::max);
        let first = outcome.details.iter().position(|d| d.mean >= max).unwrap();
        prop_assert_eq!(&outcome.best_action, &candidates[first]);
        prop_assert!((outcome.expected_value - max).abs() < 1e-9);
    }

    // With zero-impact steps, a score is exactly the keyword bonus
    #[test]
    fn prop_keyword_bonus_exact(action in arb_action(), keywords in arb_keywords()) {
        let simulator = Simulator::new(ConstantEstimator(0.0));
        let result = simulator.simulate(&action, &Value::Null, &Goals::new(keywords.clone()));

        let expected = matches(&action, &keywords);
        #[allow(clippy::cast_precision_loss)]
        let expected_score = KEYWORD_BONUS * expected as f64;
        prop_assert!((result.score - expected_score).abs() < 1e-9);
        prop_assert_eq!(result.trace.len(), STEPS + expected);
    }
}

// Sampled means settle on 25 per rollout plus 5 per matched keyword
#[test]
fn test_sampled_means_match_expected_value() {
    let evaluator = ActionEvaluator::new(UniformEstimator).with_limits(2, 2_000);
    let candidates = vec![
        CandidateAction::new("firmly, Express empathy and ask for feedback."),
        CandidateAction::new("curiously, Summarize the conversation and seek confirmation."),
    ];
    let keywords = vec!["feedback".to_string(), "empathy".to_string()];
    let outcome = evaluator
        .evaluate(&Value::Null, &Goals::new(keywords.clone()), &candidates, 2_000)
        .unwrap();

    for detail in &outcome.details {
        #[allow(clippy::cast_precision_loss)]
        let expected = 25.0 + KEYWORD_BONUS * matches(&detail.action, &keywords) as f64;
        assert!(
            (detail.mean - expected).abs() < 1.0,
            "{}: mean {} not within 1.0 of {}",
            detail.action,
            detail.mean,
            expected
        );
    }
    assert_eq!(outcome.best_action, candidates[0]);
}
