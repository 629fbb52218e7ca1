//! Reply formatting for Telegram delivery
//!
//! Models may prefix their answer with a `<think>...</think>` block. The block
//! is pulled out of the answer and re-emitted as an HTML spoiler above it, and
//! the whole reply is kept within Telegram's 4096 character message limit by
//! shortening the reasoning first.
//!
//! Lengths are counted in Unicode scalar values and every cut falls on a
//! character boundary.

/// Telegram's maximum message length
pub const MESSAGE_LIMIT: usize = 4096;

const REASONING_START: &str = "<think>";
const REASONING_END: &str = "</think>";

const SPOILER_OPEN: &str = "<tg-spoiler><b>Thinking Process:</b>\n";
const SPOILER_CLOSE: &str = "</tg-spoiler>";

/// Appended to reasoning that had to be cut
pub const TRUNCATION_SUFFIX: &str = "\n... (thinking process truncated)";

/// A raw reply split around its reasoning segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyParts<'a> {
    pub answer: String,
    /// Trimmed reasoning text; `None` when the reply has no complete segment
    pub reasoning: Option<&'a str>,
}

/// Split `raw` at the first `<think>` and the first `</think>` after it
pub fn split_reasoning(raw: &str) -> ReplyParts<'_> {
    let segment = raw.find(REASONING_START).and_then(|start| {
        let body_start = start + REASONING_START.len();
        raw[body_start..]
            .find(REASONING_END)
            .map(|len| (start, body_start, body_start + len))
    });

    let Some((start, body_start, body_end)) = segment else {
        return ReplyParts {
            answer: raw.to_string(),
            reasoning: None,
        };
    };

    let before = raw[..start].trim();
    let after = raw[body_end + REASONING_END.len()..].trim();

    let answer = match (before.is_empty(), after.is_empty()) {
        (false, false) => format!("{}\n{}", before, after),
        (false, true) => before.to_string(),
        (true, _) => after.to_string(),
    };

    ReplyParts {
        answer,
        reasoning: Some(raw[body_start..body_end].trim()),
    }
}

/// Format a raw model reply for delivery
pub fn format_reply(raw: &str) -> String {
    let parts = split_reasoning(raw);

    let Some(reasoning) = parts.reasoning else {
        return parts.answer.trim().to_string();
    };
    let answer = parts.answer;

    let assembled = if reasoning.is_empty() {
        answer.clone()
    } else {
        assemble(reasoning, &answer)
    };
    if char_len(&assembled) <= MESSAGE_LIMIT {
        return assembled.trim().to_string();
    }

    let separator_len = if answer.is_empty() || reasoning.is_empty() {
        0
    } else {
        2
    };
    let wrapper_overhead = char_len(SPOILER_OPEN) + char_len(SPOILER_CLOSE);
    let budget = MESSAGE_LIMIT as isize
        - char_len(&answer) as isize
        - separator_len
        - wrapper_overhead as isize
        - char_len(TRUNCATION_SUFFIX) as isize;

    if budget < 0 {
        // Not even an empty spoiler fits next to the answer.
        return take_chars(&answer, MESSAGE_LIMIT).trim().to_string();
    }

    let truncated = format!(
        "{}{}",
        take_chars(reasoning, budget as usize),
        TRUNCATION_SUFFIX
    );
    assemble(&truncated, &answer).trim().to_string()
}

fn assemble(reasoning: &str, answer: &str) -> String {
    format!("{}{}{}\n{}", SPOILER_OPEN, reasoning, SPOILER_CLOSE, answer)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
