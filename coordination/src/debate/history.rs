//! Round-by-round audit trail of a discussion.

use serde::{Deserialize, Serialize};

use crate::schema::CodingResponse;

/// Ordered rounds of per-rater answers for one text item.
///
/// Round 0 is the original coding-phase output; each discussion round
/// appends exactly one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscussionHistory {
    rounds: Vec<Vec<CodingResponse>>,
}

impl DiscussionHistory {
    /// Start a history from the coding-phase answers.
    pub fn new(initial: Vec<CodingResponse>) -> Self {
        Self {
            rounds: vec![initial],
        }
    }

    /// Answers from the most recent round.
    pub fn latest(&self) -> &[CodingResponse] {
        self.rounds.last().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn push(&mut self, answers: Vec<CodingResponse>) {
        self.rounds.push(answers);
    }

    /// Discussion rounds completed, not counting round 0.
    pub fn discussion_rounds(&self) -> usize {
        self.rounds.len().saturating_sub(1)
    }

    pub fn rounds(&self) -> &[Vec<CodingResponse>] {
        &self.rounds
    }
}

/// Everyone's answers except rater `index`, preserving rater order.
pub fn peer_answers(answers: &[CodingResponse], index: usize) -> Vec<CodingResponse> {
    answers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, a)| a.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(codes: &[i64]) -> Vec<CodingResponse> {
        codes
            .iter()
            .map(|c| CodingResponse::new(*c, format!("r{c}")))
            .collect()
    }

    #[test]
    fn test_new_history_has_round_zero() {
        let history = DiscussionHistory::new(answers(&[1, 2]));
        assert_eq!(history.discussion_rounds(), 0);
        assert_eq!(history.latest().len(), 2);
    }

    #[test]
    fn test_push_advances_latest() {
        let mut history = DiscussionHistory::new(answers(&[1, 2]));
        history.push(answers(&[2, 2]));
        assert_eq!(history.discussion_rounds(), 1);
        assert_eq!(history.latest()[0].code, 2);
        assert_eq!(history.rounds()[0][0].code, 1);
    }

    #[test]
    fn test_peer_answers_excludes_self_in_order() {
        let all = answers(&[1, 2, 3]);
        let peers = peer_answers(&all, 1);
        assert_eq!(peers.iter().map(|a| a.code).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(peer_answers(&all, 0).len(), 2);
    }

    #[test]
    fn test_history_serializes_as_nested_list() {
        let history = DiscussionHistory::new(answers(&[5]));
        let json = serde_json::to_value(&history).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0][0]["code"], 5);
    }
}
