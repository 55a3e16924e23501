//! Run analytics: accuracy against ground truth and cross-run statistics.

pub mod evaluation;

pub use evaluation::{
    accuracy, calc_stats, evaluate_phase, majority_vote, AggregateEvaluation, Evaluator,
    PhaseEvaluation, RunEvaluation, Stats,
};
