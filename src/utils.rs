//! Text processing utilities for code submissions and LLM output.
//!
//! Regex patterns use the `lazy-regex` crate: compile-time validated and
//! lazily initialized statics.

#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;

/// Match fenced code blocks with optional language tag: ```lang\ncode```
static RE_CODE_FENCE: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"```[a-zA-Z]*\n([\s\S]*?)```");

/// Extract code from an inbound message, handling markdown fences.
///
/// Returns the first fenced block's content if any fence is present,
/// otherwise the trimmed message as-is. Empty input yields an empty string.
#[must_use]
pub fn extract_code(text: &str) -> String {
    RE_CODE_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or_else(|| text.trim().to_string(), |m| m.as_str().trim().to_string())
}

/// Extract the test code from an LLM stage output.
///
/// Models usually wrap the final tests in a fence, often after prose; the
/// longest fenced block is taken (short fences tend to be usage snippets).
/// Returns `None` when the output contains neither a fence nor any text.
#[must_use]
pub fn extract_tests(output: &str) -> Option<String> {
    let longest = RE_CODE_FENCE
        .captures_iter(output)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .max_by_key(|s| s.len());

    match longest {
        Some(block) if !block.is_empty() => Some(block.to_string()),
        _ => {
            let trimmed = output.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
    }
}

/// Keywords that mark a message as plausibly being source code.
const CODE_MARKERS: &[&str] = &[
    "def ", "class ", "import ", "return", "=", "function", "const ", "=>",
];

/// Cheap heuristic to reject free-form chatter before it consumes a
/// rate-limit slot. Fenced messages always pass.
#[must_use]
pub fn looks_like_code(text: &str) -> bool {
    text.contains("```") || CODE_MARKERS.iter().any(|kw| text.contains(kw))
}
