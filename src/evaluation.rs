//! Action evaluation engine
//!
//! Proposes candidate conversational moves and scores each by Monte Carlo
//! rollouts of a five-step simulation. The best move is the candidate with the
//! strictly highest mean score; the first one wins ties.

mod engine;
mod generator;
mod simulator;
mod types;

#[cfg(test)]
mod proptests;

#[allow(unused_imports)] // Public API re-exports
pub use engine::{
    ActionEvaluator, DEFAULT_CANDIDATES, DEFAULT_MAX_CANDIDATES, DEFAULT_MAX_ROLLOUTS, DEFAULT_ROLLOUTS,
};
#[allow(unused_imports)]
pub use generator::{generate_candidates, BASE_TEMPLATES, MODIFIERS};
#[allow(unused_imports)]
pub use simulator::{
    ConstantEstimator, Simulator, StepEstimator, UniformEstimator, KEYWORD_BONUS, MAX_STEP_IMPACT,
    STEPS,
};
#[allow(unused_imports)]
pub use types::{
    CandidateAction, CandidateDetail, CandidatePool, EvaluationError, EvaluationOutcome, Goals,
    SimulationResult,
};
