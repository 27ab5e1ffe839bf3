//! Mention extraction and resolution.
//!
//! A mention token is a maximal run of word characters immediately preceded
//! by `@`, found by a single left-to-right scan. The same functions drive
//! both server-side persistence and client-side preview; there is exactly
//! one scanning algorithm, so the two cannot disagree.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::User;

static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").expect("valid mention regex"));

/// A raw mention found in free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionToken {
    /// Byte offset of the `@` in the source text.
    pub offset: usize,
    /// The token text, including the leading `@`. Case is preserved.
    pub raw: String,
}

impl MentionToken {
    /// The candidate name: the token without its leading `@`.
    pub fn candidate(&self) -> &str {
        &self.raw[1..]
    }
}

/// Scan `text` for mention tokens, in source order.
///
/// The sequence is lazy and restartable; scanning the same string twice
/// yields identical tokens. An `@` with no following word character yields
/// nothing, and no two tokens overlap.
pub fn mention_tokens(text: &str) -> impl Iterator<Item = MentionToken> + '_ {
    MENTION_RE.find_iter(text).map(|m| MentionToken {
        offset: m.start(),
        raw: m.as_str().to_string(),
    })
}

/// Candidate names from `text`: tokens stripped of `@`, deduplicated
/// case-insensitively, first occurrence wins.
pub fn candidate_names(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    let mut names = Vec::new();
    for token in mention_tokens(text) {
        let lowered = token.candidate().to_lowercase();
        if !seen.contains(&lowered) {
            seen.push(lowered);
            names.push(token.candidate().to_string());
        }
    }
    names
}

/// Resolve the mentions in `text` against a user directory.
///
/// A user matches when their `username` or `name` equals a candidate,
/// case-insensitively and exactly — no partial or fuzzy matching. The
/// result follows directory iteration order and contains each user at most
/// once; unmatched candidates are silently dropped.
pub fn resolve_users(text: &str, directory: &[User]) -> Vec<User> {
    let candidates: Vec<String> = candidate_names(text)
        .into_iter()
        .map(|c| c.to_lowercase())
        .collect();
    if candidates.is_empty() {
        return Vec::new();
    }

    directory
        .iter()
        .filter(|user| {
            candidates.iter().any(|candidate| {
                user.username
                    .as_deref()
                    .is_some_and(|u| u.to_lowercase() == *candidate)
                    || user.name.to_lowercase() == *candidate
            })
        })
        .cloned()
        .collect()
}

/// The partial candidate being typed at `cursor`, for inline suggestion
/// UIs: the text after the last `@` before the cursor, provided no
/// whitespace intervenes. `cursor` is a byte offset and must lie on a char
/// boundary.
pub fn suggestion_prefix(text: &str, cursor: usize) -> Option<&str> {
    let before = text.get(..cursor)?;
    let at = before.rfind('@')?;
    let query = &before[at + 1..];
    if query.contains(char::is_whitespace) {
        return None;
    }
    Some(query)
}
