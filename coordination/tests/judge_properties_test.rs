//! Judge property tests — agreement predicates across varied inputs.
//!
//! Tests verify:
//! - Empty input is disagreement for both predicates
//! - A single response always agrees
//! - Coding agreement depends only on `code`, never on `reasoning`
//! - Codebook agreement is unanimous non-objection
//! - Verdicts are stable across repeated evaluation

use coordination::debate::{no_update_requested, AgreementJudge};
use coordination::{check_agreement, check_codebook_agreement, CodebookUpdate, CodingResponse};

/// Deterministic spread of code lists: lengths 1..=6, values in 1..=4.
fn code_lists() -> Vec<Vec<i64>> {
    let mut lists = Vec::new();
    for len in 1..=6usize {
        for seed in 0..12i64 {
            lists.push(
                (0..len as i64)
                    .map(|i| 1 + (seed * 7 + i * (seed % 3)) % 4)
                    .collect(),
            );
        }
    }
    lists
}

fn responses(codes: &[i64], reasoning: &str) -> Vec<CodingResponse> {
    codes
        .iter()
        .enumerate()
        .map(|(i, code)| CodingResponse::new(*code, format!("{reasoning} #{i}")))
        .collect()
}

fn reviews(flags: &[bool]) -> Vec<CodebookUpdate> {
    flags
        .iter()
        .map(|need_update| {
            if *need_update {
                CodebookUpdate::propose("still unclear", "draft")
            } else {
                CodebookUpdate::accept("agree")
            }
        })
        .collect()
}

// ── Property: empty input disagrees ─────────────────────────────────

#[test]
fn prop_empty_input_is_disagreement() {
    assert!(!check_agreement(&[]));
    assert!(!check_codebook_agreement(&[]));
    // nothing requested, so evolution has nothing to mediate
    assert!(no_update_requested(&[]));
}

// ── Property: singleton agrees ──────────────────────────────────────

#[test]
fn prop_singleton_always_agrees() {
    for code in -3..10 {
        assert!(check_agreement(&[CodingResponse::new(code, "alone")]));
    }
}

// ── Property: verdict is equality of codes ──────────────────────────

#[test]
fn prop_agreement_iff_all_codes_equal() {
    for codes in code_lists() {
        let expected = codes.iter().all(|c| *c == codes[0]);
        assert_eq!(
            check_agreement(&responses(&codes, "because")),
            expected,
            "codes {codes:?}"
        );
    }
}

#[test]
fn prop_reasoning_never_affects_verdict() {
    for codes in code_lists() {
        let a = check_agreement(&responses(&codes, "short"));
        let b = check_agreement(&responses(&codes, "a much longer and entirely different rationale"));
        assert_eq!(a, b, "codes {codes:?}");
    }
}

// ── Property: codebook agreement is unanimous non-objection ─────────

#[test]
fn prop_codebook_agreement_iff_no_objection() {
    for len in 1..=5usize {
        for mask in 0..(1u32 << len) {
            let flags: Vec<bool> = (0..len).map(|i| mask & (1 << i) != 0).collect();
            let verdict = check_codebook_agreement(&reviews(&flags));
            assert_eq!(verdict, flags.iter().all(|f| !f), "flags {flags:?}");
            assert_eq!(no_update_requested(&reviews(&flags)), verdict);
        }
    }
}

// ── Property: idempotence ───────────────────────────────────────────

#[test]
fn prop_verdicts_are_idempotent() {
    let judge = AgreementJudge;
    for codes in code_lists() {
        let input = responses(&codes, "r");
        let first = judge.check_agreement(&input);
        for _ in 0..3 {
            assert_eq!(judge.check_agreement(&input), first);
            assert_eq!(check_agreement(&input), first);
        }
    }
    let input = reviews(&[false, true, false]);
    let first = judge.check_codebook_agreement(&input);
    assert_eq!(judge.check_codebook_agreement(&input), first);
    assert!(!first);
}

// ── Scenarios ───────────────────────────────────────────────────────

#[test]
fn scenario_unanimous_and_split_panels() {
    assert!(check_agreement(&responses(&[1, 1, 1], "r")));
    assert!(!check_agreement(&responses(&[1, 2, 1], "r")));
}
