//! Width-bounded display lines for resolved leaves

use crate::resolve::ResolvedLeaf;

const ELLIPSIS: &str = "...";

/// Renders `"<line> <path>: <value>"` in at most `max_width` chars.
///
/// Newlines are removed from the value, and an overlong value is cut and
/// marked with `...`. The line number and path are never cut, so the
/// effective width is at least their length plus the ellipsis.
pub fn format_entry(leaf: &ResolvedLeaf, max_width: usize) -> String {
    let prefix = format!("{} {}: ", leaf.line, leaf.path);
    let value: String = leaf.value.chars().filter(|c| !matches!(c, '\n' | '\r')).collect();

    let prefix_len = prefix.chars().count();
    let width = max_width.max(prefix_len + ELLIPSIS.len());
    if prefix_len + value.chars().count() <= width {
        return prefix + &value;
    }

    let keep = width - prefix_len - ELLIPSIS.len();
    let mut out = prefix;
    out.extend(value.chars().take(keep));
    out.push_str(ELLIPSIS);
    out
}

/// Formats every leaf and sorts the lines lexicographically.
///
/// The sort is on the rendered text, so `"16 b: ..."` precedes `"9 a: ..."`.
pub fn format_entries(leaves: &[ResolvedLeaf], max_width: usize) -> Vec<String> {
    let mut entries: Vec<String> = leaves.iter().map(|l| format_entry(l, max_width)).collect();
    entries.sort();
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::KeyPath;

    fn leaf(path: &[&str], value: &str, line: usize) -> ResolvedLeaf {
        let path: KeyPath = path.iter().copied().collect();
        ResolvedLeaf {
            key: path.key().to_string(),
            path,
            value: value.to_string(),
            line,
        }
    }

    #[test]
    fn test_short_entry() {
        assert_eq!(format_entry(&leaf(&["variable"], "a", 1), 40), "1 variable: a");
    }

    #[test]
    fn test_nested_path() {
        assert_eq!(
            format_entry(&leaf(&["lvl1", "var1"], "x", 3), 40),
            "3 lvl1.var1: x"
        );
    }

    #[test]
    fn test_newlines_are_stripped() {
        let entry = format_entry(&leaf(&["v"], "some\ncontent\r\n", 2), 80);
        assert_eq!(entry, "2 v: somecontent");
    }

    #[test]
    fn test_truncation() {
        let entry = format_entry(&leaf(&["v"], "some\ncontent\nlonger\nthan\nwidth", 1), 15);

        assert_eq!(entry, "1 v: somecon...");
        assert_eq!(entry.chars().count(), 15);
    }

    #[test]
    fn test_exact_fit_is_not_truncated() {
        let entry = format_entry(&leaf(&["v"], "12345", 1), 10);
        assert_eq!(entry, "1 v: 12345");
    }

    #[test]
    fn test_never_exceeds_width() {
        let long = "x".repeat(200);
        for width in 9..120 {
            let entry = format_entry(&leaf(&["v"], &long, 42), width);
            assert!(entry.chars().count() <= width, "width {}: {}", width, entry);
            assert!(entry.starts_with("42 v: "));
        }
    }

    /// Widths below the prefix plus `...` are raised to fit it, so this is
    /// the one case where the entry is longer than the requested width.
    #[test]
    fn test_width_below_prefix_is_raised() {
        let entry = format_entry(&leaf(&["a", "long", "path"], "value", 100), 5);
        assert_eq!(entry, "100 a.long.path: ...");
    }

    #[test]
    fn test_multibyte_values() {
        let entry = format_entry(&leaf(&["v"], "ééééééééééé", 1), 12);
        assert_eq!(entry, "1 v: éééé...");
    }

    #[test]
    fn test_entries_sorted_as_text() {
        let leaves = vec![
            leaf(&["variable"], "a", 1),
            leaf(&["another_variable"], "a", 9),
            leaf(&["yet_another"], "a", 16),
        ];

        assert_eq!(
            format_entries(&leaves, 40),
            ["1 variable: a", "16 yet_another: a", "9 another_variable: a"]
        );
    }
}
