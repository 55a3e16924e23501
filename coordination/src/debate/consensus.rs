//! Agreement judge — deterministic consensus predicates.
//!
//! No model call is involved: agreement on a text item is equality of the
//! `code` values, and agreement on a codebook is unanimous non-objection.

use std::collections::HashSet;

use crate::schema::{CodebookUpdate, CodingResponse};

/// Whether a set of coding responses agree.
///
/// Empty input is disagreement (nothing to agree on); a single response
/// trivially agrees with itself. `reasoning` is never compared.
pub fn check_agreement(responses: &[CodingResponse]) -> bool {
    match responses {
        [] => false,
        [_] => true,
        _ => {
            let distinct: HashSet<i64> = responses.iter().map(|r| r.code).collect();
            distinct.len() == 1
        }
    }
}

/// Whether every reviewer accepted the mediated codebook.
///
/// Empty input is disagreement.
pub fn check_codebook_agreement(reviews: &[CodebookUpdate]) -> bool {
    !reviews.is_empty() && reviews.iter().all(|r| !r.need_update)
}

/// Whether no proposal asks for a change.
///
/// Used to short-circuit codebook evolution before any mediation call.
pub fn no_update_requested(proposals: &[CodebookUpdate]) -> bool {
    proposals.iter().all(|p| !p.need_update)
}

/// Stateless judge handle for callers that prefer a value over free functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgreementJudge;

impl AgreementJudge {
    pub fn check_agreement(&self, responses: &[CodingResponse]) -> bool {
        check_agreement(responses)
    }

    pub fn check_codebook_agreement(&self, reviews: &[CodebookUpdate]) -> bool {
        check_codebook_agreement(reviews)
    }
}
