//! Prompt text for every phase and role of the panel.
//!
//! Framing prompts are configurable; the functions here supply defaults and
//! assemble the per-call user messages.

use coordination::{CodebookUpdate, CodingResponse};

/// Prompt version. Bump on any default prompt change.
pub const PROMPT_VERSION: &str = "1.2.0";

/// Appended to every mediator summary before raters review it.
pub const AGREEMENT_QUESTION: &str = "Do you all agree with the unified CODEBOOK?";

const DEFAULT_CODING: &str = "\
You will now annotate texts one at a time. Read each TEXT carefully and assign \
exactly one category from the CODEBOOK. Answer with the integer category in \
`code` and a concise justification in `reasoning`.";

const DEFAULT_DISCUSSION: &str = "\
You and other social scientists coded the same TEXT differently. You will see \
your previous answer and the answers of the others. Weigh their reasoning \
against the CODEBOOK, then give your final category in `code` and explain in \
`reasoning`. Change your answer only if you are persuaded.";

const DEFAULT_UPDATE: &str = "\
Reflect on the texts you have just coded and discussed. Where the CODEBOOK was \
ambiguous, incomplete or led to disagreement, propose a revised CODEBOOK. Set \
`need_update` to true and put the full revised CODEBOOK in `new_codebook`; if \
the CODEBOOK needs no change, set `need_update` to false.";

const DEFAULT_MEDIATOR: &str = "\
You are a neutral mediator for a panel of social scientists. You receive \
several proposed revisions of a CODEBOOK. Reconcile them into one unified \
CODEBOOK that keeps what the proposals share and resolves their conflicts. \
Reply with the unified CODEBOOK text only.";

const DEFAULT_COLLABORATIVE: &str = "\
A human expert has joined the discussion and offers the following guidance. \
Treat it as an informed perspective and weigh it alongside your own judgement.";

const DEFAULT_AUTHORITATIVE: &str = "\
The supervising human expert has issued the following guidance. It is \
binding: apply it when forming your next answer.";

pub fn default_coding() -> String {
    DEFAULT_CODING.to_string()
}

pub fn default_discussion() -> String {
    DEFAULT_DISCUSSION.to_string()
}

pub fn default_update() -> String {
    DEFAULT_UPDATE.to_string()
}

pub fn default_mediator() -> String {
    DEFAULT_MEDIATOR.to_string()
}

pub fn default_collaborative() -> String {
    DEFAULT_COLLABORATIVE.to_string()
}

pub fn default_authoritative() -> String {
    DEFAULT_AUTHORITATIVE.to_string()
}

/// System framing for a rater: persona plus the codebook it codes against.
pub fn rater_system_prompt(persona: &str, codebook: &str) -> String {
    format!("Persona:\n{persona}\n\nCODEBOOK:\n{codebook}")
}

pub fn coding_message(text: &str) -> String {
    format!("TEXT:\n{text}")
}

pub fn discussion_message(text: &str, own: &CodingResponse, others: &[CodingResponse]) -> String {
    let others = others
        .iter()
        .map(|a| format!("Another agent's response:\n{a}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("TEXT:\n{text}\n\nYOUR PREVIOUS ANSWER:\n{own}\n\nRESPONSES FROM OTHERS:\n{others}")
}

/// Evolution framing with the worked example appended when one is configured.
pub fn update_framing(update_prompt: &str, example_original: &str, example_updated: &str) -> String {
    if example_original.trim().is_empty() && example_updated.trim().is_empty() {
        return update_prompt.to_string();
    }
    format!(
        "{update_prompt}\n\nHere is an example of updating CODEBOOK:\n\
         Example ORIGINAL CODEBOOK:\n{example_original}\n\n\
         Example UPDATED CODEBOOK:\n{example_updated}"
    )
}

pub fn proposal_message(codebook: &str) -> String {
    format!("ORIGINAL CODEBOOK:\n{codebook}")
}

/// Mediator input: each proposal attributed to its rater.
pub fn mediation_message(proposals: &[CodebookUpdate]) -> String {
    let mut message = String::from("Here are the proposed CODEBOOK from other social scientists:\n\n");
    for (i, proposal) in proposals.iter().enumerate() {
        message.push_str(&format!(
            "Agent {}'s proposal:\n{}\n\n",
            i + 1,
            proposal.proposal_text()
        ));
    }
    message
}

pub fn review_message(mediator_summary: &str) -> String {
    format!("{mediator_summary}\n\n{AGREEMENT_QUESTION}")
}

/// Human guidance framed by the authority prompt.
pub fn intervention_message(authority_prompt: &str, guidance: &str) -> String {
    format!("{authority_prompt}\n\nHUMAN EXPERT GUIDANCE:\n{guidance}")
}
