use std::sync::LazyLock;

use regex::Regex;

use super::{ClassifyOptions, SkipReason};
use crate::utils::{collapse_whitespace, contains_alphabetic};

/// Text that reads like code rather than prose: `{...}`, `${...}`, a
/// backtick template, a declaration keyword or an arrow function.
static CODE_LIKE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:\{.*\}|\$\{.*\}|`.*`|(?:const|let|var|function)\b.*|\(?[\w\s,]*\)?\s*=>.*)$",
    )
    .unwrap()
});

/// Decide whether literal text is worth translating.
///
/// Returns `Ok(())` for translatable text, or the reason it is skipped.
pub fn classify_text(text: &str, options: &ClassifyOptions) -> Result<(), SkipReason> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SkipReason::Whitespace);
    }
    if options.ignore_texts.contains(trimmed) {
        return Err(SkipReason::Ignored);
    }
    if !contains_alphabetic(trimmed) {
        return Err(SkipReason::NoLetters);
    }
    if trimmed.chars().count() < 2 {
        return Err(SkipReason::TooShort);
    }
    if CODE_LIKE_REGEX.is_match(&collapse_whitespace(trimmed)) {
        return Err(SkipReason::CodeLike);
    }
    Ok(())
}
