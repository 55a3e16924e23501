//! Simulation driver: load a dataset, run the panel one or more times,
//! persist every run and evaluate it against ground truth.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use coordination::analytics::AggregateEvaluation;
use coordination::corpus::load_codebook;
use coordination::debate::{load_run_record, validate_record, IntegrityStatus};
use coordination::{ChunkRecord, Corpus, Evaluator, ResultWriter, RunEvaluation};
use tracing::{info, warn};

use crate::agents::{ConsoleExpert, InterventionSource, NoIntervention, PanelFactory};
use crate::capability::{OpenAiChatClient, RatingCapability, RetryPolicy, RetryingCapability};
use crate::config::PanelConfig;
use crate::orchestrator::{ConsensusOrchestrator, OrchestratorSettings};

/// File name of a run's evaluation summary.
pub const EVALUATION_FILE: &str = "evaluation.json";

/// Outcome of one completed run.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_dir: PathBuf,
    pub records: Vec<ChunkRecord>,
    pub evaluation: Option<RunEvaluation>,
}

pub struct Simulation {
    config: PanelConfig,
    corpus: Corpus,
    codebook: String,
}

impl Simulation {
    /// Load the dataset and starting codebook named by `config`.
    pub fn load(config: PanelConfig) -> Result<Self> {
        let dir = config.dataset_dir();
        let corpus = Corpus::load_dir(&dir)
            .with_context(|| format!("Failed to load dataset from {}", dir.display()))?;
        let codebook = load_codebook(&dir)
            .with_context(|| format!("Failed to load codebook from {}", dir.display()))?;
        info!(
            dataset = %config.dataset_name,
            items = corpus.len(),
            labelled = corpus.ground_truth().len(),
            "Dataset loaded"
        );
        Ok(Self::new(config, corpus, codebook))
    }

    pub fn new(config: PanelConfig, corpus: Corpus, codebook: impl Into<String>) -> Self {
        Self {
            config,
            corpus,
            codebook: codebook.into(),
        }
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Seed for the zero-based `run_index`.
    pub fn seed_for(&self, run_index: usize) -> u64 {
        self.config.settings.seed + run_index as u64
    }

    /// `<result_path>/<model>/<timestamp>_<dataset>_<seed>`
    pub fn run_dir(&self, timestamp: &str, seed: u64) -> PathBuf {
        self.model_dir()
            .join(format!("{timestamp}_{}_{seed}", self.config.dataset_name))
    }

    fn model_dir(&self) -> PathBuf {
        self.config
            .paths
            .result_path
            .join(sanitize(&self.config.settings.model))
    }

    /// Production run: HTTP capability with retry, console or no intervention.
    pub async fn run_single(&self, run_index: usize) -> Result<RunOutcome> {
        let seed = self.seed_for(run_index);
        let client = OpenAiChatClient::from_config(&self.config, seed)?;
        let capability: Arc<dyn RatingCapability> = Arc::new(RetryingCapability::new(
            client,
            RetryPolicy::from(&self.config.retry),
        ));
        let source: Box<dyn InterventionSource> = if self.config.settings.intervention.enabled {
            Box::new(ConsoleExpert::new())
        } else {
            Box::new(NoIntervention)
        };
        self.run_with(run_index, capability, source).await
    }

    /// Run the panel over every chunk with the given collaborators.
    pub async fn run_with(
        &self,
        run_index: usize,
        capability: Arc<dyn RatingCapability>,
        source: Box<dyn InterventionSource>,
    ) -> Result<RunOutcome> {
        let seed = self.seed_for(run_index);
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let run_dir = self.run_dir(&timestamp, seed);
        let mut writer = ResultWriter::create(&run_dir)?;
        info!(run = run_index + 1, seed, dir = %run_dir.display(), "Starting run");

        let factory = PanelFactory::new(&self.config, capability);
        let mut orchestrator = ConsensusOrchestrator::new(
            factory.build_raters(&self.codebook),
            factory.build_mediator(),
            self.codebook.clone(),
            OrchestratorSettings::from_config(&self.config),
        )?
        .with_intervention_source(source);

        let chunks = self.corpus.chunks(self.config.settings.chunk_size);
        orchestrator
            .run(&chunks, &mut writer)
            .await
            .with_context(|| {
                format!(
                    "Run {} aborted; partial results in {}",
                    run_index + 1,
                    run_dir.display()
                )
            })?;

        let evaluation = self.evaluate_records(writer.records());
        if let Some(evaluation) = &evaluation {
            writer.write_named(EVALUATION_FILE, evaluation)?;
            log_evaluation(evaluation);
        }
        let records = writer.into_records();
        Ok(RunOutcome {
            run_dir,
            records,
            evaluation,
        })
    }

    /// `runs` sequential production runs plus an aggregate summary.
    pub async fn run_multiple(&self, runs: usize) -> Result<Option<AggregateEvaluation>> {
        let mut evaluator = Evaluator::new(self.corpus.ground_truth());
        for run_index in 0..runs {
            let outcome = self.run_single(run_index).await?;
            if outcome.evaluation.is_some() {
                evaluator.evaluate_run(&outcome.records);
            }
        }
        self.write_aggregate(&evaluator, runs)
    }

    /// Write `aggregate_<timestamp>_<n>runs.json` when there is anything to aggregate.
    pub fn write_aggregate(
        &self,
        evaluator: &Evaluator,
        runs: usize,
    ) -> Result<Option<AggregateEvaluation>> {
        let Some(aggregate) = evaluator.aggregate() else {
            warn!("No evaluated runs to aggregate");
            return Ok(None);
        };
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let path = ResultWriter::create(self.model_dir())?
            .write_named(&format!("aggregate_{timestamp}_{runs}runs.json"), &aggregate)?;
        info!(
            runs,
            mean_coding_accuracy = aggregate.coding_accuracy.mean,
            path = %path.display(),
            "Aggregate evaluation written"
        );
        Ok(Some(aggregate))
    }

    /// Evaluate a previously written run log against this dataset.
    pub fn evaluate_file(&self, path: &Path) -> Result<RunEvaluation> {
        let records = load_run_record(path)
            .with_context(|| format!("Failed to load run record {}", path.display()))?;
        for record in &records {
            match validate_record(record) {
                IntegrityStatus::Valid => {}
                IntegrityStatus::Recoverable { warnings } => {
                    warn!(chunk = record.chunk_id, ?warnings, "Chunk record has inconsistencies");
                }
                IntegrityStatus::Corrupted { errors } => {
                    anyhow::bail!(
                        "chunk {} in {} is corrupted: {}",
                        record.chunk_id,
                        path.display(),
                        errors.join("; ")
                    );
                }
            }
        }
        let evaluation = self
            .evaluate_records(&records)
            .context("Dataset has no labels to evaluate against")?;
        log_evaluation(&evaluation);
        Ok(evaluation)
    }

    fn evaluate_records(&self, records: &[ChunkRecord]) -> Option<RunEvaluation> {
        let truth = self.corpus.ground_truth();
        if truth.is_empty() {
            return None;
        }
        Some(Evaluator::new(truth).evaluate_run(records))
    }
}

fn log_evaluation(evaluation: &RunEvaluation) {
    info!(
        coding_accuracy = evaluation.coding.accuracy,
        discussion_accuracy = ?evaluation.discussion.as_ref().map(|d| d.accuracy),
        improvement = ?evaluation.discussion.as_ref().and_then(|d| d.improvement),
        coding_agreement = evaluation.coding_agreement_rate,
        final_agreement = evaluation.final_agreement_rate,
        "Run evaluation"
    );
}

/// Model names may contain path separators (`org/model`).
fn sanitize(model: &str) -> String {
    model.replace(['/', '\\', ':'], "_")
}
