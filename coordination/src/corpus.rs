//! Text corpus, chunking and ground truth.
//!
//! A dataset lives in `<data_path>/<dataset>/` as `data.xlsx` (or any
//! spreadsheet format calamine understands, or `data.json`) next to a
//! `codebook.txt`. Rows need a `Text` column; `Label` is only required
//! when the run is evaluated.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use calamine::Reader;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::warn;

const TEXT_COLUMN: &str = "Text";
const LABEL_COLUMN: &str = "Label";
const SPREADSHEET_NAMES: [&str; 3] = ["data.xlsx", "data.xls", "data.ods"];
const JSON_NAME: &str = "data.json";
const CODEBOOK_NAME: &str = "codebook.txt";

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Spreadsheet error in {path}: {reason}")]
    Spreadsheet { path: PathBuf, reason: String },

    #[error("Malformed JSON dataset {path}: {reason}")]
    Json { path: PathBuf, reason: String },

    #[error("Missing column '{0}'")]
    MissingColumn(&'static str),

    #[error("Row {row}: label '{value}' is not an integer")]
    BadLabel { row: usize, value: String },

    #[error("No dataset file found in {0}")]
    NotFound(PathBuf),

    #[error("Dataset is empty")]
    Empty,
}

/// Stable identifier of a text item, `Text-<1-based row>` on the wire.
///
/// Ordered by row number so persisted maps keep batch order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextId(usize);

const TEXT_ID_PREFIX: &str = "Text-";

impl TextId {
    /// Build the identifier for the item at zero-based `index`.
    pub fn from_index(index: usize) -> Self {
        Self(index + 1)
    }

    /// One-based row number.
    pub fn number(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TEXT_ID_PREFIX}{}", self.0)
    }
}

impl FromStr for TextId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(TEXT_ID_PREFIX)
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .map(Self)
            .ok_or_else(|| format!("invalid text id '{s}', expected {TEXT_ID_PREFIX}<n>"))
    }
}

impl Serialize for TextId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TextId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// One immutable text to be coded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextItem {
    pub id: TextId,
    pub text: String,
}

/// An ordered batch of text items processed before the codebook may evolve.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Zero-based chunk index.
    pub index: usize,
    pub items: Vec<TextItem>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Mapping from text id to the reference label.
pub type GroundTruth = BTreeMap<TextId, i64>;

#[derive(Debug, Deserialize)]
struct JsonRow {
    text: String,
    #[serde(default)]
    label: Option<i64>,
}

/// The full ordered dataset.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    items: Vec<TextItem>,
    labels: Vec<Option<i64>>,
}

impl Corpus {
    /// Build a corpus from `(text, label)` pairs in order.
    pub fn from_rows<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<i64>)>,
        S: Into<String>,
    {
        let mut corpus = Self::default();
        for (index, (text, label)) in rows.into_iter().enumerate() {
            corpus.items.push(TextItem {
                id: TextId::from_index(index),
                text: text.into(),
            });
            corpus.labels.push(label);
        }
        corpus
    }

    /// Build a corpus from a header row plus data rows of cell strings.
    pub fn from_table(table: &[Vec<String>]) -> Result<Self, CorpusError> {
        let (header, rows) = table.split_first().ok_or(CorpusError::Empty)?;
        let text_col = column_index(header, TEXT_COLUMN)?;
        let label_col = column_index(header, LABEL_COLUMN).ok();

        // Ids follow the data row, so a skipped blank row leaves a gap
        // instead of shifting every later id.
        let mut corpus = Self::default();
        for (row_idx, row) in rows.iter().enumerate() {
            let text = row.get(text_col).map(|s| s.trim()).unwrap_or_default();
            if text.is_empty() {
                warn!(row = row_idx + 2, "Skipping row with empty text");
                continue;
            }
            let label = match label_col.and_then(|c| row.get(c)) {
                Some(raw) if !raw.trim().is_empty() => Some(parse_label(raw, row_idx + 2)?),
                _ => None,
            };
            corpus.items.push(TextItem {
                id: TextId::from_index(row_idx),
                text: text.to_string(),
            });
            corpus.labels.push(label);
        }

        if corpus.is_empty() {
            return Err(CorpusError::Empty);
        }
        Ok(corpus)
    }

    /// Load `data.xlsx` / `data.xls` / `data.ods` / `data.json` from a dataset directory.
    pub fn load_dir(dir: &Path) -> Result<Self, CorpusError> {
        for name in SPREADSHEET_NAMES {
            let path = dir.join(name);
            if path.is_file() {
                return Self::load_spreadsheet(&path);
            }
        }
        let json = dir.join(JSON_NAME);
        if json.is_file() {
            return Self::load_json(&json);
        }
        Err(CorpusError::NotFound(dir.to_path_buf()))
    }

    /// Load the first worksheet of a spreadsheet file.
    pub fn load_spreadsheet(path: &Path) -> Result<Self, CorpusError> {
        let spreadsheet_err = |reason: String| CorpusError::Spreadsheet {
            path: path.to_path_buf(),
            reason,
        };

        let mut workbook =
            calamine::open_workbook_auto(path).map_err(|e| spreadsheet_err(e.to_string()))?;
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| spreadsheet_err("workbook has no sheets".to_string()))?;
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| spreadsheet_err(e.to_string()))?;

        let table: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        Self::from_table(&table)
    }

    /// Load a JSON array of `{ "text": ..., "label": ... }` objects.
    pub fn load_json(path: &Path) -> Result<Self, CorpusError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rows: Vec<JsonRow> = serde_json::from_str(&raw).map_err(|e| CorpusError::Json {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if rows.is_empty() {
            return Err(CorpusError::Empty);
        }
        Ok(Self::from_rows(rows.into_iter().map(|r| (r.text, r.label))))
    }

    pub fn items(&self) -> &[TextItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Split into ordered chunks of at most `chunk_size` items.
    ///
    /// A `chunk_size` of zero is treated as one chunk holding everything.
    pub fn chunks(&self, chunk_size: usize) -> Vec<Chunk> {
        let size = if chunk_size == 0 {
            self.items.len().max(1)
        } else {
            chunk_size
        };
        self.items
            .chunks(size)
            .enumerate()
            .map(|(index, items)| Chunk {
                index,
                items: items.to_vec(),
            })
            .collect()
    }

    /// Labels for every item that has one.
    pub fn ground_truth(&self) -> GroundTruth {
        self.items
            .iter()
            .zip(&self.labels)
            .filter_map(|(item, label)| label.map(|l| (item.id.clone(), l)))
            .collect()
    }
}

/// Read `<dir>/codebook.txt`.
pub fn load_codebook(dir: &Path) -> Result<String, CorpusError> {
    let path = dir.join(CODEBOOK_NAME);
    std::fs::read_to_string(&path).map_err(|source| CorpusError::Io { path, source })
}

fn column_index(header: &[String], name: &'static str) -> Result<usize, CorpusError> {
    header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or(CorpusError::MissingColumn(name))
}

fn parse_label(raw: &str, row: usize) -> Result<i64, CorpusError> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(v);
    }
    // Spreadsheets hand integers back as floats ("2" vs "2.0").
    match trimmed.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 => Ok(v as i64),
        _ => Err(CorpusError::BadLabel {
            row,
            value: trimmed.to_string(),
        }),
    }
}
