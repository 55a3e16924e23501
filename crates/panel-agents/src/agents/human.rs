//! Human intervention sources.
//!
//! A source is polled once per live intervention point and returns either
//! guidance text or nothing. Returning nothing is the normal case.

use std::collections::VecDeque;

use async_trait::async_trait;
use coordination::InterventionPoint;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};

use crate::error::{PanelError, PanelResult};

#[async_trait]
pub trait InterventionSource: Send {
    async fn intervene(&mut self, point: &InterventionPoint) -> PanelResult<Option<String>>;
}

/// Never intervenes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIntervention;

#[async_trait]
impl InterventionSource for NoIntervention {
    async fn intervene(&mut self, _point: &InterventionPoint) -> PanelResult<Option<String>> {
        Ok(None)
    }
}

/// Replays queued answers in order; `None` once the queue is empty.
/// Every polled point is remembered.
#[derive(Debug, Default)]
pub struct ScriptedExpert {
    answers: VecDeque<Option<String>>,
    polled: Vec<InterventionPoint>,
}

impl ScriptedExpert {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(|a| a.map(Into::into)).collect(),
            polled: Vec::new(),
        }
    }

    pub fn polled(&self) -> &[InterventionPoint] {
        &self.polled
    }
}

#[async_trait]
impl InterventionSource for ScriptedExpert {
    async fn intervene(&mut self, point: &InterventionPoint) -> PanelResult<Option<String>> {
        self.polled.push(point.clone());
        Ok(self.answers.pop_front().flatten())
    }
}

/// Reads one line of guidance from stdin per point. A blank line or EOF
/// means no intervention.
pub struct ConsoleExpert {
    lines: tokio::io::Lines<BufReader<Stdin>>,
}

impl ConsoleExpert {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for ConsoleExpert {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InterventionSource for ConsoleExpert {
    async fn intervene(&mut self, point: &InterventionPoint) -> PanelResult<Option<String>> {
        let mut stdout = tokio::io::stdout();
        let prompt = format!("\n[{point}] Human expert guidance (blank line to skip): ");
        stdout
            .write_all(prompt.as_bytes())
            .await
            .map_err(|e| PanelError::Intervention(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| PanelError::Intervention(e.to_string()))?;

        let line = self
            .lines
            .next_line()
            .await
            .map_err(|e| PanelError::Intervention(e.to_string()))?;
        Ok(line
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()))
    }
}
