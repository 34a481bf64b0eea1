//! Monte Carlo evaluation over candidate actions

use super::generator::generate_candidates;
use super::simulator::{Simulator, StepEstimator, UniformEstimator};
use super::types::{CandidateAction, CandidateDetail, EvaluationError, EvaluationOutcome, Goals};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Rollouts per candidate when the caller does not say
pub const DEFAULT_ROLLOUTS: usize = 50;

/// Pool size for [`ActionEvaluator::generate_best_action`]
pub const DEFAULT_CANDIDATES: usize = 100;

/// Largest candidate pool accepted unless configured otherwise
pub const DEFAULT_MAX_CANDIDATES: usize = 200;

/// Largest rollout count per candidate accepted unless configured otherwise
pub const DEFAULT_MAX_ROLLOUTS: usize = 500;

pub struct ActionEvaluator<E = UniformEstimator> {
    simulator: Arc<Simulator<E>>,
    max_parallelism: usize,
    max_candidates: usize,
    max_rollouts: usize,
}

impl<E: StepEstimator + 'static> ActionEvaluator<E> {
    pub fn new(estimator: E) -> Self {
        Self {
            simulator: Arc::new(Simulator::new(estimator)),
            max_parallelism: 4,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            max_rollouts: DEFAULT_MAX_ROLLOUTS,
        }
    }

    /// Bound on candidates evaluated at once by the parallel entry points
    pub fn with_max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism.max(1);
        self
    }

    /// Upper bounds on pool size and rollouts per candidate; larger requests are rejected
    pub fn with_limits(mut self, max_candidates: usize, max_rollouts: usize) -> Self {
        self.max_candidates = max_candidates.max(1);
        self.max_rollouts = max_rollouts.max(1);
        self
    }

    /// Evaluate every candidate sequentially
    pub fn evaluate(
        &self,
        history: &Value,
        goals: &Goals,
        candidates: &[CandidateAction],
        rollouts: usize,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        self.validate(candidates.len(), rollouts)?;
        let details = candidates
            .iter()
            .map(|action| evaluate_candidate(&self.simulator, action, history, goals, rollouts))
            .collect();
        select_best(details)
    }

    /// Evaluate candidates on the blocking pool, at most `max_parallelism` at a time.
    ///
    /// Selection runs over input order, so ties resolve exactly as in
    /// [`Self::evaluate`].
    pub async fn evaluate_parallel(
        &self,
        history: Value,
        goals: Goals,
        candidates: Vec<CandidateAction>,
        rollouts: usize,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        self.validate(candidates.len(), rollouts)?;

        let count = candidates.len();
        let history = Arc::new(history);
        let goals = Arc::new(goals);
        let semaphore = Arc::new(Semaphore::new(self.max_parallelism));
        let mut tasks = JoinSet::new();

        for (index, action) in candidates.into_iter().enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| EvaluationError::Worker(e.to_string()))?;
            let simulator = Arc::clone(&self.simulator);
            let history = Arc::clone(&history);
            let goals = Arc::clone(&goals);

            tasks.spawn_blocking(move || {
                let _permit = permit;
                (
                    index,
                    evaluate_candidate(&simulator, &action, &history, &goals, rollouts),
                )
            });
        }

        let mut indexed = Vec::with_capacity(count);
        while let Some(joined) = tasks.join_next().await {
            indexed.push(joined.map_err(|e| EvaluationError::Worker(e.to_string()))?);
        }
        indexed.sort_by_key(|(index, _)| *index);

        tracing::debug!(candidates = count, rollouts, "Parallel evaluation finished");
        select_best(indexed.into_iter().map(|(_, detail)| detail).collect())
    }

    /// Generate a fresh candidate pool and evaluate it with default sizes
    pub fn generate_best_action(&self, history: &Value, goals: &Goals) -> Result<EvaluationOutcome, EvaluationError> {
        let (count, rollouts) = self.generated_sizes();
        let candidates = generate_candidates(&mut rand::thread_rng(), history, goals, count);
        self.evaluate(history, goals, &candidates, rollouts)
    }

    pub async fn generate_best_action_parallel(
        &self,
        history: Value,
        goals: Goals,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        let (count, rollouts) = self.generated_sizes();
        let candidates = generate_candidates(&mut rand::thread_rng(), &history, &goals, count);
        self.evaluate_parallel(history, goals, candidates, rollouts)
            .await
    }

    /// Default pool and rollout sizes, shrunk to fit the configured limits
    fn generated_sizes(&self) -> (usize, usize) {
        (
            DEFAULT_CANDIDATES.min(self.max_candidates),
            DEFAULT_ROLLOUTS.min(self.max_rollouts),
        )
    }

    fn validate(&self, candidates: usize, rollouts: usize) -> Result<(), EvaluationError> {
        if candidates == 0 {
            return Err(EvaluationError::InvalidArgument(
                "at least one candidate action is required".to_string(),
            ));
        }
        if candidates > self.max_candidates {
            return Err(EvaluationError::InvalidArgument(format!(
                "at most {} candidates may be evaluated, got {candidates}",
                self.max_candidates
            )));
        }
        if rollouts == 0 {
            return Err(EvaluationError::InvalidArgument(
                "rolloutsPerCandidate must be at least 1".to_string(),
            ));
        }
        if rollouts > self.max_rollouts {
            return Err(EvaluationError::InvalidArgument(format!(
                "rolloutsPerCandidate must be at most {}, got {rollouts}",
                self.max_rollouts
            )));
        }
        Ok(())
    }
}

fn evaluate_candidate<E: StepEstimator>(
    simulator: &Simulator<E>,
    action: &CandidateAction,
    history: &Value,
    goals: &Goals,
    rollouts: usize,
) -> CandidateDetail {
    let results: Vec<_> = (0..rollouts)
        .map(|_| simulator.simulate(action, history, goals))
        .collect();
    #[allow(clippy::cast_precision_loss)]
    let mean = results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64;

    CandidateDetail {
        action: action.clone(),
        mean,
        rollouts: results,
    }
}

/// Strictly highest mean wins; the earliest candidate keeps a tie
fn select_best(details: Vec<CandidateDetail>) -> Result<EvaluationOutcome, EvaluationError> {
    let mut best: Option<&CandidateDetail> = None;
    for detail in &details {
        if best.map_or(true, |b| detail.mean > b.mean) {
            best = Some(detail);
        }
    }
    let best = best.ok_or_else(|| {
        EvaluationError::InvalidArgument("at least one candidate action is required".to_string())
    })?;

    Ok(EvaluationOutcome {
        best_action: best.action.clone(),
        expected_value: best.mean,
        details,
    })
}
