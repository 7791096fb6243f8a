//! Name normalization and length fitting.
//!
//! Normalization folds a display name into the `[a-z0-9.-]` handle
//! alphabet: lowercase, canonical Unicode decomposition with combining
//! marks stripped, separator runs collapsed, and only the first
//! whitespace-delimited token kept.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Normalizes one name into handle form.
///
/// Returns `None` when nothing usable remains.
#[must_use]
pub fn normalize_name(input: &str) -> Option<String> {
    let mut out = String::with_capacity(input.len());
    let mut prev_separator = false;

    // NFD splits 'é' into 'e' + combining acute; dropping the marks leaves
    // the base letter. Whitespace survives this pass so the first-token cut
    // below still has boundaries to work with.
    for ch in input.to_lowercase().nfd().filter(|c| !is_combining_mark(*c)) {
        if ch.is_whitespace() {
            out.push(' ');
            prev_separator = false;
        } else if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            out.push(ch);
            prev_separator = false;
        } else if (ch == '.' || ch == '-') && !prev_separator {
            out.push(ch);
            prev_separator = true;
        }
        // Everything else is dropped outright.
    }

    let token = out
        .split_whitespace()
        .next()?
        .trim_matches(|c| c == '.' || c == '-');
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Fits a `first.last` base into `max_len`, truncating both halves
/// proportionally to their original lengths so that both names stay
/// readable. Each half keeps at least one character.
///
/// Legacy fallback, preserved exactly: when fewer than 2 characters remain
/// after the separator, only the first part is truncated and the second is
/// left whole. Changing this would change generated usernames for
/// existing data.
#[must_use]
pub fn truncate_proportionally(first: &str, last: &str, max_len: usize) -> (String, String) {
    let first_len = first.chars().count();
    let last_len = last.chars().count();
    if first_len + 1 + last_len <= max_len {
        return (first.to_string(), last.to_string());
    }

    let available = max_len.saturating_sub(1);
    if available < 2 {
        let first_keep = available.max(1);
        return (first.chars().take(first_keep).collect(), last.to_string());
    }

    let total = first_len + last_len;
    let first_keep = ((available * first_len) / total).clamp(1, available - 1);
    let last_keep = available - first_keep;

    (
        first.chars().take(first_keep).collect(),
        last.chars().take(last_keep).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_diacritics() {
        assert_eq!(normalize_name("José"), Some("jose".to_string()));
        assert_eq!(normalize_name("Núñez"), Some("nunez".to_string()));
        assert_eq!(normalize_name("Åse"), Some("ase".to_string()));
        assert_eq!(normalize_name("Müller"), Some("muller".to_string()));
    }

    #[test]
    fn test_keeps_first_token_only() {
        assert_eq!(normalize_name("Mary Jane"), Some("mary".to_string()));
        assert_eq!(normalize_name("  van  der Berg"), Some("van".to_string()));
    }

    #[test]
    fn test_collapses_separator_runs() {
        assert_eq!(normalize_name("a..b"), Some("a.b".to_string()));
        assert_eq!(normalize_name("a--b"), Some("a-b".to_string()));
        assert_eq!(normalize_name("a.-b"), Some("a.b".to_string()));
    }

    #[test]
    fn test_trims_edge_separators() {
        assert_eq!(normalize_name(".abc."), Some("abc".to_string()));
        assert_eq!(normalize_name("-abc-"), Some("abc".to_string()));
    }

    #[test]
    fn test_drops_everything_else() {
        assert_eq!(normalize_name("O'Brien"), Some("obrien".to_string()));
        assert_eq!(normalize_name("Jean+Luc!"), Some("jeanluc".to_string()));
        assert_eq!(normalize_name("李"), None);
        assert_eq!(normalize_name("!!!"), None);
        assert_eq!(normalize_name(""), None);
        assert_eq!(normalize_name("   "), None);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for input in ["jane", "jane.doe", "x-1", "abc123"] {
            let once = normalize_name(input).unwrap();
            let twice = normalize_name(&once).unwrap();
            assert_eq!(once, twice);
            assert_eq!(once, input);
        }
    }

    #[test]
    fn test_proportional_truncation() {
        // Lengths 10 and 3 into a combined max of 8: available = 7,
        // the longer part keeps 5 (loses 5), the shorter keeps 2 (loses 1).
        let (first, last) = truncate_proportionally("abcdefghij", "xyz", 8);
        assert_eq!(first, "abcde");
        assert_eq!(last, "xy");
        assert!(first.len() >= 1 && last.len() >= 1);
        assert_eq!(first.len() + 1 + last.len(), 8);
    }

    #[test]
    fn test_no_truncation_when_fitting() {
        let (first, last) = truncate_proportionally("jane", "doe", 30);
        assert_eq!(first, "jane");
        assert_eq!(last, "doe");
    }

    #[test]
    fn test_each_half_keeps_at_least_one_char() {
        let (first, last) = truncate_proportionally("a", "verylonglastname", 6);
        assert_eq!(first, "a");
        assert_eq!(last.len(), 4);

        let (first, last) = truncate_proportionally("verylongfirstname", "b", 6);
        assert!(!first.is_empty());
        assert!(!last.is_empty());
    }

    #[test]
    fn test_legacy_fallback_truncates_first_part_only() {
        // max_len 2 leaves less than 2 characters after the separator:
        // only the first part is cut, the last stays whole.
        let (first, last) = truncate_proportionally("abcdef", "ghi", 2);
        assert_eq!(first, "a");
        assert_eq!(last, "ghi");
    }
}
