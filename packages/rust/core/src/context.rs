//! Budgeted prompt assembly.
//!
//! Retrieved passages are joined in rank order and the longest prefix that
//! stays strictly under the character budget is placed into the prompt.

use docbot_shared::{DocBotError, Passage, PromptContext, Result};

/// Separator placed between passages in the context.
pub const SEPARATOR: &str = "\n\n---\n\n";

/// Fixed instruction text preceding the context. The first passage follows
/// it directly, with no separator.
pub const PROMPT_PREAMBLE: &str = "Answer the question based on the context below.\n\n\
Context: you are a developer relations documentation bot. Answer the questions in a way \
which would be the most helpful for developers trying to get information from \
documentation, including API references, code samples when appropriate.";

/// Build the prompt for `query` from ranked `passages` under `char_limit`.
///
/// Let `joined(k)` be the first `k` passages joined with [`SEPARATOR`]. The
/// context is `joined(k - 1)` for the smallest `k` with
/// `len(joined(k)) >= char_limit`, or every passage if no such `k` exists.
/// When the first passage alone reaches the limit the context is empty.
///
/// `source_url` is always the top passage's URL, even when zero passages fit.
/// Lengths are counted in chars.
pub fn build_prompt(query: &str, passages: &[Passage], char_limit: usize) -> Result<PromptContext> {
    let top = passages.first().ok_or(DocBotError::NoContext)?;

    let included = fitting_prefix(passages, char_limit);
    let context = join_passages(&passages[..included]);

    let mut prompt_text =
        String::with_capacity(PROMPT_PREAMBLE.len() + context.len() + query.len() + 32);
    prompt_text.push_str(PROMPT_PREAMBLE);
    prompt_text.push_str(&context);
    prompt_text.push_str(&question_trailer(query));

    Ok(PromptContext {
        prompt_text,
        source_url: top.url.clone(),
        included,
    })
}

/// Number of leading passages whose join stays strictly under `char_limit`,
/// stopping at the first prefix that reaches it.
pub fn fitting_prefix(passages: &[Passage], char_limit: usize) -> usize {
    let sep_len = SEPARATOR.chars().count();
    let mut joined_len = 0usize;

    for (i, passage) in passages.iter().enumerate() {
        if i > 0 {
            joined_len += sep_len;
        }
        joined_len += passage.text.chars().count();
        if joined_len >= char_limit {
            return i;
        }
    }
    passages.len()
}

/// Join passage texts with [`SEPARATOR`].
pub fn join_passages(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

fn question_trailer(query: &str) -> String {
    format!("\n\nQuestion: {query}\nAnswer:")
}
