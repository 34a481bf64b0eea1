//! Single-rollout action simulator

use super::types::{CandidateAction, Goals, SimulationResult};
use rand::Rng;
use serde_json::Value;

/// Reasoning steps per rollout
pub const STEPS: usize = 5;

/// Exclusive upper bound of one step's impact
pub const MAX_STEP_IMPACT: f64 = 10.0;

/// Added once per goal keyword found in the action text
pub const KEYWORD_BONUS: f64 = 5.0;

/// Largest impact a step may contribute
const STEP_IMPACT_CEILING: f64 = MAX_STEP_IMPACT - 1e-9;

/// Source of per-step impact values
pub trait StepEstimator: Send + Sync {
    /// Impact of reasoning step `step` (1-based)
    fn estimate(&self, step: usize, action: &CandidateAction, history: &Value) -> f64;
}

/// Uniform draw from `[0, MAX_STEP_IMPACT)`
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformEstimator;

impl StepEstimator for UniformEstimator {
    fn estimate(&self, _step: usize, _action: &CandidateAction, _history: &Value) -> f64 {
        rand::thread_rng().gen_range(0.0..MAX_STEP_IMPACT)
    }
}

/// Same value every step
#[allow(dead_code)] // Used in tests
#[derive(Debug, Clone, Copy)]
pub struct ConstantEstimator(pub f64);

impl StepEstimator for ConstantEstimator {
    fn estimate(&self, _step: usize, _action: &CandidateAction, _history: &Value) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Simulator<E = UniformEstimator> {
    estimator: E,
}

impl<E: StepEstimator> Simulator<E> {
    pub fn new(estimator: E) -> Self {
        Self { estimator }
    }

    pub fn simulate(&self, action: &CandidateAction, history: &Value, goals: &Goals) -> SimulationResult {
        let mut score = 0.0;
        let mut trace = Vec::with_capacity(STEPS + goals.keywords.len());

        for step in 1..=STEPS {
            let impact = clamp_impact(self.estimator.estimate(step, action, history));
            trace.push(format!("Step {step}: estimated impact {impact:.2}"));
            score += impact;
        }

        let text = action.text.to_lowercase();
        for keyword in &goals.keywords {
            if text.contains(&keyword.to_lowercase()) {
                score += KEYWORD_BONUS;
                trace.push(format!("Bonus: action contains keyword '{keyword}'"));
            }
        }

        SimulationResult {
            score,
            trace,
            final_state: format!("Simulated final state for action: {action}"),
        }
    }
}

fn clamp_impact(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, STEP_IMPACT_CEILING)
    }
}
