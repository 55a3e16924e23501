//! Accuracy evaluation of chunk records against ground truth.
//!
//! The panel's answer for an item is the majority code across raters.
//! Coding-phase accuracy is compared with post-discussion accuracy to
//! measure what discussion bought.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::corpus::{GroundTruth, TextId};
use crate::debate::persistence::ChunkRecord;
use crate::schema::CodingResponse;

/// Fraction of positions where prediction equals truth. Zero on empty input.
pub fn accuracy(predictions: &[i64], truths: &[i64]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let correct = predictions
        .iter()
        .zip(truths)
        .filter(|(p, t)| p == t)
        .count();
    correct as f64 / predictions.len() as f64
}

/// Most frequent code; ties go to the code seen first.
pub fn majority_vote(codes: &[i64]) -> Option<i64> {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for code in codes {
        *counts.entry(*code).or_insert(0) += 1;
    }
    let best = counts.values().copied().max()?;
    codes.iter().copied().find(|c| counts[c] == best)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Accuracy of one phase's answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseEvaluation {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
    /// Keyed by zero-based rater index.
    pub per_rater_accuracy: BTreeMap<usize, f64>,
    /// Accuracy gain over the coding phase (discussion only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvement: Option<f64>,
}

/// Score per-item answer lists against ground truth; items without a label are skipped.
pub fn evaluate_phase(
    results: &BTreeMap<TextId, Vec<CodingResponse>>,
    ground_truth: &GroundTruth,
) -> PhaseEvaluation {
    let mut panel_preds = Vec::new();
    let mut truths = Vec::new();
    let mut per_rater: BTreeMap<usize, (Vec<i64>, Vec<i64>)> = BTreeMap::new();

    for (id, responses) in results {
        let Some(&truth) = ground_truth.get(id) else {
            continue;
        };
        let codes: Vec<i64> = responses.iter().map(|r| r.code).collect();
        let Some(panel) = majority_vote(&codes) else {
            continue;
        };

        for (rater, code) in codes.iter().enumerate() {
            let entry = per_rater.entry(rater).or_default();
            entry.0.push(*code);
            entry.1.push(truth);
        }
        panel_preds.push(panel);
        truths.push(truth);
    }

    let correct = panel_preds
        .iter()
        .zip(&truths)
        .filter(|(p, t)| p == t)
        .count();

    PhaseEvaluation {
        total: truths.len(),
        correct,
        accuracy: round4(accuracy(&panel_preds, &truths)),
        per_rater_accuracy: per_rater
            .into_iter()
            .map(|(rater, (preds, ts))| (rater, round4(accuracy(&preds, &ts))))
            .collect(),
        improvement: None,
    }
}

/// Evaluation summary of one complete run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvaluation {
    pub coding: PhaseEvaluation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discussion: Option<PhaseEvaluation>,
    /// Share of items the raters agreed on straight away.
    pub coding_agreement_rate: f64,
    /// Share of items agreed on after discussion.
    pub final_agreement_rate: f64,
}

/// Descriptive statistics across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Mean, median, population std, min and max, rounded to four places.
pub fn calc_stats(values: &[f64]) -> Option<Stats> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    Some(Stats {
        mean: round4(mean),
        median: round4(median),
        std: round4(variance.sqrt()),
        min: round4(sorted[0]),
        max: round4(sorted[sorted.len() - 1]),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateEvaluation {
    pub num_runs: usize,
    pub coding_accuracy: Stats,
    pub discussion_accuracy: Option<Stats>,
    pub improvement: Option<Stats>,
}

/// Tracks evaluations across runs against a fixed ground truth.
#[derive(Debug, Clone)]
pub struct Evaluator {
    ground_truth: GroundTruth,
    runs: Vec<RunEvaluation>,
}

impl Evaluator {
    pub fn new(ground_truth: GroundTruth) -> Self {
        Self {
            ground_truth,
            runs: Vec::new(),
        }
    }

    pub fn runs(&self) -> &[RunEvaluation] {
        &self.runs
    }

    /// Evaluate every chunk of one run and remember the result.
    pub fn evaluate_run(&mut self, records: &[ChunkRecord]) -> RunEvaluation {
        let mut coding_results = BTreeMap::new();
        let mut final_results = BTreeMap::new();
        let mut coding_agreements = Vec::new();
        let mut final_agreements = Vec::new();

        for record in records {
            coding_results.extend(
                record
                    .coding_phase
                    .results
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
            final_results.extend(
                record
                    .discussion_phase
                    .results
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
            coding_agreements.extend(record.coding_phase.agreements.values().copied());
            final_agreements.extend(record.discussion_phase.agreements.values().copied());
        }

        let coding = evaluate_phase(&coding_results, &self.ground_truth);
        let discussion = (!final_results.is_empty()).then(|| {
            let mut eval = evaluate_phase(&final_results, &self.ground_truth);
            eval.improvement = Some(round4(eval.accuracy - coding.accuracy));
            eval
        });

        let run = RunEvaluation {
            coding,
            discussion,
            coding_agreement_rate: round4(rate(&coding_agreements)),
            final_agreement_rate: round4(rate(&final_agreements)),
        };
        self.runs.push(run.clone());
        run
    }

    /// Statistics across every evaluated run.
    pub fn aggregate(&self) -> Option<AggregateEvaluation> {
        let coding: Vec<f64> = self.runs.iter().map(|r| r.coding.accuracy).collect();
        let discussion: Vec<f64> = self
            .runs
            .iter()
            .filter_map(|r| r.discussion.as_ref().map(|d| d.accuracy))
            .collect();
        let improvement: Vec<f64> = self
            .runs
            .iter()
            .filter_map(|r| r.discussion.as_ref().and_then(|d| d.improvement))
            .collect();

        Some(AggregateEvaluation {
            num_runs: self.runs.len(),
            coding_accuracy: calc_stats(&coding)?,
            discussion_accuracy: calc_stats(&discussion),
            improvement: calc_stats(&improvement),
        })
    }
}

fn rate(verdicts: &[bool]) -> f64 {
    if verdicts.is_empty() {
        return 0.0;
    }
    verdicts.iter().filter(|v| **v).count() as f64 / verdicts.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::persistence::{CodingPhaseRecord, DiscussionPhaseRecord};

    fn answers(codes: &[i64]) -> Vec<CodingResponse> {
        codes.iter().map(|c| CodingResponse::new(*c, "")).collect()
    }

    fn truth(labels: &[i64]) -> GroundTruth {
        labels
            .iter()
            .enumerate()
            .map(|(i, l)| (TextId::from_index(i), *l))
            .collect()
    }

    #[test]
    fn test_majority_vote_tie_takes_first_seen() {
        assert_eq!(majority_vote(&[2, 1, 1, 2]), Some(2));
        assert_eq!(majority_vote(&[3, 1, 1]), Some(1));
        assert_eq!(majority_vote(&[]), None);
    }

    #[test]
    fn test_accuracy_empty_is_zero() {
        assert_eq!(accuracy(&[], &[]), 0.0);
        assert_eq!(accuracy(&[1, 2], &[1, 3]), 0.5);
    }

    #[test]
    fn test_evaluate_phase_counts_majority_and_raters() {
        let mut results = BTreeMap::new();
        results.insert(TextId::from_index(0), answers(&[1, 1, 2]));
        results.insert(TextId::from_index(1), answers(&[2, 3, 3]));
        results.insert(TextId::from_index(5), answers(&[9, 9, 9]));

        let eval = evaluate_phase(&results, &truth(&[1, 2]));
        assert_eq!(eval.total, 2);
        assert_eq!(eval.correct, 1);
        assert_eq!(eval.accuracy, 0.5);
        assert_eq!(eval.per_rater_accuracy[&0], 1.0);
        assert_eq!(eval.per_rater_accuracy[&1], 0.5);
        assert_eq!(eval.per_rater_accuracy[&2], 0.0);
    }

    #[test]
    fn test_calc_stats() {
        let stats = calc_stats(&[0.5, 1.0, 0.75, 0.25]).unwrap();
        assert_eq!(stats.mean, 0.625);
        assert_eq!(stats.median, 0.625);
        assert_eq!(stats.min, 0.25);
        assert_eq!(stats.max, 1.0);
        assert_eq!(stats.std, 0.2795);
        assert!(calc_stats(&[]).is_none());
    }

    #[test]
    fn test_evaluate_run_reports_improvement_and_rates() {
        let id0 = TextId::from_index(0);
        let id1 = TextId::from_index(1);

        let mut coding = CodingPhaseRecord::default();
        coding.results.insert(id0.clone(), answers(&[1, 1]));
        coding.results.insert(id1.clone(), answers(&[1, 2]));
        coding.agreements.insert(id0.clone(), true);
        coding.agreements.insert(id1.clone(), false);

        let mut discussion = DiscussionPhaseRecord::default();
        discussion.results.insert(id0.clone(), answers(&[1, 1]));
        discussion.results.insert(id1.clone(), answers(&[2, 2]));
        discussion.agreements.insert(id0, true);
        discussion.agreements.insert(id1, true);

        let record = ChunkRecord {
            chunk_id: 0,
            coding_phase: coding,
            discussion_phase: discussion,
            final_codebook: String::new(),
            evolution: None,
            interventions: Vec::new(),
        };

        let mut evaluator = Evaluator::new(truth(&[1, 2]));
        let run = evaluator.evaluate_run(&[record]);
        assert_eq!(run.coding.accuracy, 0.5);
        let discussion = run.discussion.unwrap();
        assert_eq!(discussion.accuracy, 1.0);
        assert_eq!(discussion.improvement, Some(0.5));
        assert_eq!(run.coding_agreement_rate, 0.5);
        assert_eq!(run.final_agreement_rate, 1.0);

        let aggregate = evaluator.aggregate().unwrap();
        assert_eq!(aggregate.num_runs, 1);
        assert_eq!(aggregate.coding_accuracy.mean, 0.5);
    }

    #[test]
    fn test_aggregate_without_runs() {
        assert!(Evaluator::new(GroundTruth::new()).aggregate().is_none());
    }
}
