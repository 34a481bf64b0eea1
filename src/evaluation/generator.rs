//! Candidate action generator

use super::types::{CandidateAction, Goals};
use rand::Rng;
use serde_json::Value;

pub const BASE_TEMPLATES: [&str; 5] = [
    "Ask for more details regarding the issue.",
    "Express empathy and ask for feedback.",
    "Provide reassurance and request clarifying information.",
    "Suggest a potential solution and ask for opinions.",
    "Summarize the conversation and seek confirmation.",
];

pub const MODIFIERS: [&str; 5] = ["immediately", "gently", "curiously", "firmly", "thoughtfully"];

/// Draw `count` candidates of the form `"{modifier}, {base}"`.
///
/// History and goals do not influence the draw yet; they are accepted so
/// callers need not change once they do.
pub fn generate_candidates<R: Rng + ?Sized>(
    rng: &mut R,
    _history: &Value,
    _goals: &Goals,
    count: usize,
) -> Vec<CandidateAction> {
    (0..count)
        .map(|_| {
            let base = BASE_TEMPLATES[rng.gen_range(0..BASE_TEMPLATES.len())];
            let modifier = MODIFIERS[rng.gen_range(0..MODIFIERS.len())];
            CandidateAction::new(format!("{modifier}, {base}"))
        })
        .collect()
}
