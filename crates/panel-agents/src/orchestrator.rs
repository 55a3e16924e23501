//! Consensus orchestrator: drives one chunk at a time through
//! coding → discussion → codebook evolution.
//!
//! Within a round every rater call is independent of its peers' same-round
//! answers, so the calls run concurrently and are joined before the judge
//! looks at them. Rounds, phases and chunks are strictly sequential.

use std::collections::BTreeMap;

use coordination::debate::{
    no_update_requested, peer_answers, CodingPhaseRecord, DiscussionPhaseRecord, EvolutionRecord,
    MediationRound,
};
use coordination::{
    check_agreement, check_codebook_agreement, Chunk, ChunkPhase, ChunkRecord, ChunkSession,
    CodebookUpdate, CodingResponse, DiscussionHistory, DiscussionTermination,
    EvolutionTermination, InterventionPoint, InterventionPolicy, InterventionRecord,
    ResultWriter, RoundGuard, TextId,
};
use futures::future::try_join_all;
use tracing::{debug, info};

use crate::agents::{AgentRole, InterventionSource, Mediator, NoIntervention, RaterAgent};
use crate::config::PanelConfig;
use crate::error::{PanelError, PanelResult};
use crate::prompts;

/// Phase framings and bounds for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub rounds: u32,
    pub coding_prompt: String,
    pub discussion_prompt: String,
    /// Evolution framing, worked example included.
    pub update_prompt: String,
    pub intervention: InterventionPolicy,
    /// Framing placed in front of human guidance.
    pub authority_prompt: String,
}

impl OrchestratorSettings {
    pub fn from_config(config: &PanelConfig) -> Self {
        Self {
            rounds: config.settings.rounds,
            coding_prompt: config.prompt.coding.clone(),
            discussion_prompt: config.prompt.discussion.clone(),
            update_prompt: prompts::update_framing(
                &config.prompt.update,
                &config.codebook_example.original,
                &config.codebook_example.updated,
            ),
            intervention: config.settings.intervention,
            authority_prompt: config.authority_prompt().to_string(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            rounds: 3,
            coding_prompt: prompts::default_coding(),
            discussion_prompt: prompts::default_discussion(),
            update_prompt: prompts::default_update(),
            intervention: InterventionPolicy::disabled(),
            authority_prompt: prompts::default_collaborative(),
        }
    }
}

pub struct ConsensusOrchestrator {
    raters: Vec<RaterAgent>,
    mediator: Mediator,
    intervention: Box<dyn InterventionSource>,
    settings: OrchestratorSettings,
    guard: RoundGuard,
    codebook: String,
    /// Interventions applied during the chunk in progress.
    applied: Vec<InterventionRecord>,
}

impl ConsensusOrchestrator {
    pub fn new(
        raters: Vec<RaterAgent>,
        mediator: Mediator,
        codebook: impl Into<String>,
        settings: OrchestratorSettings,
    ) -> PanelResult<Self> {
        if raters.is_empty() {
            return Err(PanelError::Configuration(
                "the panel needs at least one rater".into(),
            ));
        }
        if settings.rounds == 0 {
            return Err(PanelError::Configuration(
                "rounds must be at least 1".into(),
            ));
        }
        Ok(Self {
            raters,
            mediator,
            intervention: Box::new(NoIntervention),
            guard: RoundGuard::new(settings.rounds),
            settings,
            codebook: codebook.into(),
            applied: Vec::new(),
        })
    }

    pub fn with_intervention_source(mut self, source: Box<dyn InterventionSource>) -> Self {
        self.intervention = source;
        self
    }

    /// Codebook the next chunk starts from.
    pub fn codebook(&self) -> &str {
        &self.codebook
    }

    pub fn raters(&self) -> &[RaterAgent] {
        &self.raters
    }

    /// Process every chunk in order, persisting each record as soon as it
    /// is sealed. The first fatal error aborts the run; chunks already
    /// written stay on disk.
    pub async fn run(
        &mut self,
        chunks: &[Chunk],
        writer: &mut ResultWriter,
    ) -> PanelResult<()> {
        for chunk in chunks {
            let record = self.run_chunk(chunk).await?;
            writer.write_chunk(record)?;
        }
        info!(chunks = chunks.len(), "All chunks processed");
        Ok(())
    }

    /// Drive one chunk through all three phases.
    pub async fn run_chunk(&mut self, chunk: &Chunk) -> PanelResult<ChunkRecord> {
        let mut session = ChunkSession::new(chunk.index);
        self.applied.clear();
        info!(chunk = chunk.index, items = chunk.len(), "Starting chunk");

        session.advance(ChunkPhase::Coding, "chunk started")?;
        let coding = self.coding_phase(chunk).await?;
        let disagreements = coding.agreements.values().filter(|agreed| !**agreed).count();

        session.advance(
            ChunkPhase::Discussion,
            &format!("{disagreements} items in disagreement"),
        )?;
        let discussion = self.discussion_phase(chunk, &coding).await?;

        session.advance(ChunkPhase::Evolution, "discussion finished")?;
        let evolution = self.evolution_phase().await?;

        session.advance(ChunkPhase::Complete, &evolution.termination.to_string())?;
        info!(status = %session.status_line(), "Chunk complete");

        Ok(ChunkRecord {
            chunk_id: chunk.index,
            coding_phase: coding,
            discussion_phase: discussion,
            final_codebook: self.codebook.clone(),
            evolution: Some(evolution),
            interventions: std::mem::take(&mut self.applied),
        })
    }

    // ── Coding ────────────────────────────────────────────────────────────

    async fn coding_phase(&mut self, chunk: &Chunk) -> PanelResult<CodingPhaseRecord> {
        let mut record = CodingPhaseRecord::default();
        for item in &chunk.items {
            for rater in &mut self.raters {
                rater.reset_conversation();
                rater.add_instruction(&self.settings.coding_prompt);
            }
            let answers = try_join_all(
                self.raters
                    .iter_mut()
                    .map(|rater| rater.code_text(&item.text)),
            )
            .await?;

            let agreed = check_agreement(&answers);
            info!(
                chunk = chunk.index,
                text_id = %item.id,
                codes = ?codes(&answers),
                verdict = agreed,
                "Coding verdict"
            );
            record.results.insert(item.id.clone(), answers);
            record.agreements.insert(item.id.clone(), agreed);
        }
        Ok(record)
    }

    // ── Discussion ────────────────────────────────────────────────────────

    async fn discussion_phase(
        &mut self,
        chunk: &Chunk,
        coding: &CodingPhaseRecord,
    ) -> PanelResult<DiscussionPhaseRecord> {
        let mut record = DiscussionPhaseRecord::default();
        for item in &chunk.items {
            let Some(initial) = coding.results.get(&item.id) else {
                continue;
            };
            if coding.agreements.get(&item.id).copied().unwrap_or(false) {
                record.results.insert(item.id.clone(), initial.clone());
                record.agreements.insert(item.id.clone(), true);
                continue;
            }

            let (history, termination) = self.discuss_item(&item.id, &item.text, initial).await?;
            info!(
                chunk = chunk.index,
                text_id = %item.id,
                codes = ?codes(history.latest()),
                outcome = %termination,
                "Discussion finished"
            );
            record
                .results
                .insert(item.id.clone(), history.latest().to_vec());
            record
                .agreements
                .insert(item.id.clone(), termination.consensus_reached());
            record.history.insert(item.id.clone(), history);
            record.terminations.insert(item.id.clone(), termination);
        }
        Ok(record)
    }

    async fn discuss_item(
        &mut self,
        text_id: &TextId,
        text: &str,
        initial: &[CodingResponse],
    ) -> PanelResult<(DiscussionHistory, DiscussionTermination)> {
        for rater in &mut self.raters {
            rater.reset_conversation();
            rater.add_instruction(&self.settings.discussion_prompt);
        }

        let mut history = DiscussionHistory::new(initial.to_vec());
        let mut termination = DiscussionTermination::RoundsExhausted {
            rounds: self.guard.max_rounds(),
        };
        for round in self.guard.rounds() {
            let previous = history.latest().to_vec();
            let mut answers = self.discussion_round(text, &previous).await?;

            let point = InterventionPoint::Discussion {
                text_id: text_id.clone(),
                round,
            };
            if self.intervene(point).await? {
                answers = self.discussion_round(text, &previous).await?;
            }

            let agreed = check_agreement(&answers);
            debug!(text_id = %text_id, round, codes = ?codes(&answers), verdict = agreed, "Discussion round");
            history.push(answers);
            if agreed || self.guard.is_last(round) {
                termination = self.guard.discussion_outcome(round, agreed);
                break;
            }
        }
        Ok((history, termination))
    }

    /// Every rater answers against the previous round only.
    async fn discussion_round(
        &mut self,
        text: &str,
        previous: &[CodingResponse],
    ) -> PanelResult<Vec<CodingResponse>> {
        try_join_all(self.raters.iter_mut().enumerate().map(|(i, rater)| {
            let own = previous[i].clone();
            let others = peer_answers(previous, i);
            async move { rater.discuss(text, &own, &others).await }
        }))
        .await
    }

    // ── Codebook evolution ────────────────────────────────────────────────

    async fn evolution_phase(&mut self) -> PanelResult<EvolutionRecord> {
        for rater in &mut self.raters {
            rater.reset_conversation();
            rater.add_instruction(&self.settings.update_prompt);
        }

        let current = self.codebook.clone();
        let mut proposals = self.propose_round(&current).await?;
        let initial = proposals.clone();

        if no_update_requested(&proposals) {
            info!(role = %AgentRole::Judge, "No rater requested a codebook change");
            self.broadcast_codebook(current);
            return Ok(EvolutionRecord {
                proposals: initial,
                rounds: Vec::new(),
                termination: EvolutionTermination::Unchanged,
            });
        }

        if self.intervene(InterventionPoint::CodebookProposal).await? {
            proposals = self.propose_round(&current).await?;
        }

        let mut rounds = Vec::new();
        let mut adopted = current;
        let mut termination = EvolutionTermination::RoundsExhausted {
            rounds: self.guard.max_rounds(),
        };
        for round in self.guard.rounds() {
            let summary = self.mediator.mediate(&proposals).await?;
            info!(role = %AgentRole::Mediator, round, "Mediated codebook drafted");

            let message = prompts::review_message(&summary);
            let mut reviews = self.review_round(&message).await?;
            if self.intervene(InterventionPoint::CodebookReview { round }).await? {
                reviews = self.review_round(&message).await?;
            }

            let agreed = check_codebook_agreement(&reviews);
            info!(round, verdict = agreed, "Codebook review verdict");
            rounds.push(MediationRound {
                round,
                mediator_summary: summary.clone(),
                reviews: reviews.clone(),
                agreement: agreed,
            });
            adopted = summary;

            if agreed {
                termination = EvolutionTermination::ConsensusReached { round };
                break;
            }
            if self.guard.is_last(round) {
                termination = EvolutionTermination::RoundsExhausted { rounds: round };
                break;
            }
            proposals = reviews;
        }

        info!(outcome = %termination, "Codebook evolution finished");
        self.broadcast_codebook(adopted);
        Ok(EvolutionRecord {
            proposals: initial,
            rounds,
            termination,
        })
    }

    async fn propose_round(&mut self, codebook: &str) -> PanelResult<Vec<CodebookUpdate>> {
        try_join_all(
            self.raters
                .iter_mut()
                .map(|rater| rater.propose_codebook_update(codebook)),
        )
        .await
    }

    async fn review_round(&mut self, message: &str) -> PanelResult<Vec<CodebookUpdate>> {
        try_join_all(
            self.raters
                .iter_mut()
                .map(|rater| rater.review_mediated_codebook(message)),
        )
        .await
    }

    /// Every rater adopts `codebook`; their conversations are cleared.
    fn broadcast_codebook(&mut self, codebook: String) {
        for rater in &mut self.raters {
            rater.update_codebook(&codebook);
        }
        self.codebook = codebook;
    }

    // ── Intervention ──────────────────────────────────────────────────────

    /// Poll the source once at `point` if the policy allows it. Guidance is
    /// injected into every rater; the caller recomputes the round.
    async fn intervene(&mut self, point: InterventionPoint) -> PanelResult<bool> {
        if !self.settings.intervention.allows(&point) {
            return Ok(false);
        }
        let guidance = match self.intervention.intervene(&point).await? {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Ok(false),
        };

        info!(role = %AgentRole::Human, point = %point, "Human intervention applied");
        let message = prompts::intervention_message(&self.settings.authority_prompt, &guidance);
        for rater in &mut self.raters {
            rater.inject_intervention(&message);
        }
        self.applied.push(InterventionRecord::new(
            point,
            self.settings.intervention.authority,
            guidance,
        ));
        Ok(true)
    }
}

fn codes(answers: &[CodingResponse]) -> Vec<i64> {
    answers.iter().map(|a| a.code).collect()
}

/// Per-item final codes, for quick inspection of a sealed record.
pub fn final_codes(record: &ChunkRecord) -> BTreeMap<TextId, Vec<i64>> {
    record
        .discussion_phase
        .results
        .iter()
        .map(|(id, answers)| (id.clone(), codes(answers)))
        .collect()
}
