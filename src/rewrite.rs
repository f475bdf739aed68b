//! The line rewrite primitive: replace the first numeric token on one line.
//!
//! Save content is treated as opaque text split on `\n`. Line numbering is
//! 1-based to match the directive document. Rewriting never changes the line
//! count; every line other than the target passes through byte-identical.

use regex::Regex;
use std::sync::LazyLock;

/// One or more digits, optionally followed by a decimal point and more digits.
static NUMERIC_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.?\d*").expect("numeric token pattern is valid"));

/// Result of a single line rewrite.
///
/// Only `Applied` carries new content; for the other variants the caller's
/// content is unchanged. A line without any numeric token is reported
/// distinctly rather than folded into success, so callers can tell "value
/// changed" from "nothing to change".
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "RewriteOutcome should be checked for applied/skipped"]
pub enum RewriteOutcome {
    /// The first numeric token on the line was replaced.
    Applied {
        content: String,
        old_token: String,
        new_token: String,
    },
    /// The selected line exists but holds no numeric token.
    NoNumericToken,
    /// `line_index` is outside `[1, line_count]`.
    OutOfRange { line_count: usize },
}

/// Replace the first numeric token on the 1-based `line_index` with
/// `replacement`.
///
/// Out-of-range indices and token-less lines are soft outcomes, never errors;
/// the content is returned to the caller untouched in those cases.
pub fn apply(content: &str, line_index: usize, replacement: &str) -> RewriteOutcome {
    let mut lines: Vec<&str> = content.split('\n').collect();

    if line_index == 0 || line_index > lines.len() {
        return RewriteOutcome::OutOfRange {
            line_count: lines.len(),
        };
    }

    let target = lines[line_index - 1];
    let Some(found) = NUMERIC_TOKEN.find(target) else {
        return RewriteOutcome::NoNumericToken;
    };

    let old_token = found.as_str().to_string();
    let rewritten = format!(
        "{}{}{}",
        &target[..found.start()],
        replacement,
        &target[found.end()..]
    );

    lines[line_index - 1] = &rewritten;
    RewriteOutcome::Applied {
        content: lines.join("\n"),
        old_token,
        new_token: replacement.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rewrite_first_line() {
        let content = "HP: 30\nMP: 10\n";
        match apply(content, 1, "42.5") {
            RewriteOutcome::Applied {
                content,
                old_token,
                new_token,
            } => {
                assert_eq!(content, "HP: 42.5\nMP: 10\n");
                assert_eq!(old_token, "30");
                assert_eq!(new_token, "42.5");
            }
            other => panic!("expected Applied, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_is_soft() {
        let content = "HP: 30\nMP: 10";
        let outcome = apply(content, 99, "5");
        assert_eq!(outcome, RewriteOutcome::OutOfRange { line_count: 2 });
    }

    #[test]
    fn test_line_zero_is_out_of_range() {
        let outcome = apply("HP: 30", 0, "5");
        assert_eq!(outcome, RewriteOutcome::OutOfRange { line_count: 1 });
    }

    #[test]
    fn test_no_numeric_token_reported() {
        let content = "name: kris\nHP: 30";
        let outcome = apply(content, 1, "5");
        assert_eq!(outcome, RewriteOutcome::NoNumericToken);
    }

    #[test]
    fn test_only_first_token_replaced() {
        let content = "pos: 10 20 30";
        match apply(content, 1, "99") {
            RewriteOutcome::Applied { content, .. } => {
                assert_eq!(content, "pos: 99 20 30");
            }
            other => panic!("expected Applied, got {:?}", other),
        }
    }

    #[test]
    fn test_decimal_token_replaced_whole() {
        let content = "speed: 2.75x";
        match apply(content, 1, "3") {
            RewriteOutcome::Applied {
                content, old_token, ..
            } => {
                assert_eq!(old_token, "2.75");
                assert_eq!(content, "speed: 3x");
            }
            other => panic!("expected Applied, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_newline_counts_as_line() {
        // split('\n') yields a final empty line for trailing-newline content;
        // that empty line is addressable and has no numeric token.
        let content = "HP: 30\n";
        let outcome = apply(content, 2, "5");
        assert_eq!(outcome, RewriteOutcome::NoNumericToken);
    }

    #[test]
    fn test_other_lines_untouched() {
        let content = "a: 1\nb: 2\nc: 3";
        match apply(content, 2, "7") {
            RewriteOutcome::Applied { content, .. } => {
                assert_eq!(content, "a: 1\nb: 7\nc: 3");
            }
            other => panic!("expected Applied, got {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_line_count_never_changes(
            lines in proptest::collection::vec("[ -~]{0,20}", 1..12),
            index in 1usize..12,
            value in 0u32..100_000,
        ) {
            let content = lines.join("\n");
            let replacement = value.to_string();
            if let RewriteOutcome::Applied { content: new_content, .. } =
                apply(&content, index, &replacement)
            {
                prop_assert_eq!(
                    new_content.split('\n').count(),
                    content.split('\n').count()
                );
            }
        }

        #[test]
        fn prop_untouched_lines_identical(
            lines in proptest::collection::vec("[ -~]{0,20}", 1..12),
            index in 1usize..12,
        ) {
            let content = lines.join("\n");
            if let RewriteOutcome::Applied { content: new_content, .. } =
                apply(&content, index, "0")
            {
                let before: Vec<&str> = content.split('\n').collect();
                let after: Vec<&str> = new_content.split('\n').collect();
                for (i, (b, a)) in before.iter().zip(after.iter()).enumerate() {
                    if i + 1 != index {
                        prop_assert_eq!(b, a);
                    }
                }
            }
        }
    }
}
