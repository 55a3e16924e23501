//! Chunk and run records — the persisted audit trail of a simulation.
//!
//! Each chunk is written to disk as soon as it is sealed, so a run that
//! aborts part-way still leaves every completed chunk behind.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::guardrails::{DiscussionTermination, EvolutionTermination};
use super::history::DiscussionHistory;
use crate::corpus::TextId;
use crate::intervention::InterventionRecord;
use crate::schema::{CodebookUpdate, CodingResponse};

/// File name of the cumulative run log.
pub const RUN_LOG_FILE: &str = "full_simulation_log.json";

/// Coding-phase results: round 0 for every item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodingPhaseRecord {
    pub results: BTreeMap<TextId, Vec<CodingResponse>>,
    pub agreements: BTreeMap<TextId, bool>,
}

/// Discussion-phase results.
///
/// `history` only holds items that were discussed. `results` and
/// `agreements` hold every item; items that agreed during coding carry
/// their coding answers unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscussionPhaseRecord {
    pub history: BTreeMap<TextId, DiscussionHistory>,
    pub results: BTreeMap<TextId, Vec<CodingResponse>>,
    pub agreements: BTreeMap<TextId, bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub terminations: BTreeMap<TextId, DiscussionTermination>,
}

/// One mediation iteration: the summary and every rater's review of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediationRound {
    pub round: u32,
    pub mediator_summary: String,
    pub reviews: Vec<CodebookUpdate>,
    pub agreement: bool,
}

/// Audit of the codebook evolution phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRecord {
    pub proposals: Vec<CodebookUpdate>,
    pub rounds: Vec<MediationRound>,
    pub termination: EvolutionTermination,
}

/// Sealed result of one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: usize,
    pub coding_phase: CodingPhaseRecord,
    pub discussion_phase: DiscussionPhaseRecord,
    pub final_codebook: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evolution: Option<EvolutionRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interventions: Vec<InterventionRecord>,
}

impl ChunkRecord {
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        serde_json::to_string_pretty(self).map_err(|e| PersistenceError::SerializeFailed {
            reason: e.to_string(),
        })
    }

    /// Items whose coding verdict was disagreement.
    pub fn discussed_items(&self) -> impl Iterator<Item = &TextId> {
        self.coding_phase
            .agreements
            .iter()
            .filter(|(_, agreed)| !**agreed)
            .map(|(id, _)| id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("serialize failed: {reason}")]
    SerializeFailed { reason: String },

    #[error("deserialize failed for {path}: {reason}")]
    DeserializeFailed { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Integrity check result for a loaded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityStatus {
    Valid,
    /// Usable, with inconsistencies worth reporting.
    Recoverable { warnings: Vec<String> },
    /// Structurally inconsistent; not safe to evaluate.
    Corrupted { errors: Vec<String> },
}

impl IntegrityStatus {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Valid | Self::Recoverable { .. })
    }
}

/// Check a chunk record against the data-model invariants.
pub fn validate_record(record: &ChunkRecord) -> IntegrityStatus {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let coding = &record.coding_phase;
    let discussion = &record.discussion_phase;

    let rater_counts: Vec<usize> = coding.results.values().map(Vec::len).collect();
    if rater_counts.windows(2).any(|w| w[0] != w[1]) {
        errors.push("coding results have differing rater counts".to_string());
    }

    for id in coding.results.keys() {
        if !coding.agreements.contains_key(id) {
            errors.push(format!("{} has no coding verdict", id));
        }
    }

    for (id, history) in &discussion.history {
        if coding.agreements.get(id) == Some(&true) {
            errors.push(format!("{} was discussed despite coding agreement", id));
        }
        match coding.results.get(id) {
            Some(round0) if history.rounds().first() != Some(round0) => {
                errors.push(format!("{} history round 0 differs from coding results", id));
            }
            None => errors.push(format!("{} discussed but never coded", id)),
            _ => {}
        }
        if discussion.results.get(id).map(Vec::as_slice) != Some(history.latest()) {
            warnings.push(format!("{} final answers differ from last round", id));
        }
    }

    for id in record.discussed_items() {
        if !discussion.history.contains_key(id) {
            warnings.push(format!("{} disagreed but has no discussion history", id));
        }
    }

    if !errors.is_empty() {
        IntegrityStatus::Corrupted { errors }
    } else if !warnings.is_empty() {
        IntegrityStatus::Recoverable { warnings }
    } else {
        IntegrityStatus::Valid
    }
}

/// Writes chunk and run records into one run directory.
#[derive(Debug)]
pub struct ResultWriter {
    dir: PathBuf,
    records: Vec<ChunkRecord>,
}

impl ResultWriter {
    /// Create (or reuse) `dir`.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| PersistenceError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            records: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ChunkRecord> {
        self.records
    }

    /// Persist a sealed chunk and refresh the cumulative run log.
    pub fn write_chunk(&mut self, record: ChunkRecord) -> Result<PathBuf, PersistenceError> {
        let path = self.dir.join(format!("chunk_{}_results.json", record.chunk_id));
        write_json(&path, &record)?;
        self.records.push(record);
        write_json(&self.dir.join(RUN_LOG_FILE), &self.records)?;
        info!(path = %path.display(), chunks = self.records.len(), "Persisted chunk record");
        Ok(path)
    }

    /// Write any serializable value as `<dir>/<name>`.
    pub fn write_named<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, PersistenceError> {
        let path = self.dir.join(name);
        write_json(&path, value)?;
        Ok(path)
    }
}

/// Serialize `value` pretty-printed to `path`, flushed to disk before returning.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| PersistenceError::SerializeFailed {
        reason: e.to_string(),
    })?;
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::create(path).map_err(io_err)?;
    file.write_all(json.as_bytes()).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    debug!(path = %path.display(), bytes = json.len(), "Wrote JSON");
    Ok(())
}

/// Load a run log: either a list of chunk records or a single chunk record.
pub fn load_run_record(path: &Path) -> Result<Vec<ChunkRecord>, PersistenceError> {
    let raw = std::fs::read_to_string(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let de_err = |e: serde_json::Error| PersistenceError::DeserializeFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let value: serde_json::Value = serde_json::from_str(&raw).map_err(de_err)?;
    if value.is_array() {
        serde_json::from_value(value).map_err(de_err)
    } else {
        let single: ChunkRecord = serde_json::from_value(value).map_err(de_err)?;
        Ok(vec![single])
    }
}
