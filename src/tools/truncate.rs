//! Word-boundary truncation of string cells.

use crate::db::Value;

/// Suffix appended to truncated strings.
pub const TRUNCATION_SUFFIX: &str = "...";

/// Truncates `content` to at most `length` characters, cutting at the last
/// space that fits and appending `suffix`.
///
/// Strings of at most `length` characters, and a `length` of zero, leave the
/// content untouched. A prefix without any space is cut hard.
pub fn truncate_word(content: &str, length: usize, suffix: &str) -> String {
    if length == 0 || content.chars().count() <= length {
        return content.to_string();
    }

    let suffix_len = suffix.chars().count();
    if length <= suffix_len {
        return suffix.chars().take(length).collect();
    }

    let prefix: String = content.chars().take(length - suffix_len).collect();
    let kept = match prefix.rfind(' ') {
        Some(idx) => &prefix[..idx],
        None => prefix.as_str(),
    };

    format!("{kept}{suffix}")
}

/// Truncates string values; every other value passes through unchanged.
pub fn truncate_value(value: Value, length: usize) -> Value {
    match value {
        Value::String(s) => Value::String(truncate_word(&s, length, TRUNCATION_SUFFIX)),
        other => other,
    }
}
