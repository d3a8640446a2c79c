//! Finding every leaf path that ends in a given key

use crate::document::{Document, KeyPath};

/// Returns one path per leaf named `key`, in pre-order.
///
/// Mappings named `key` are not matches. An empty result means the key
/// is not a leaf anywhere in the document.
pub fn find_paths(document: &Document, key: &str) -> Vec<KeyPath> {
    document
        .leaves()
        .filter(|leaf| leaf.path.key() == key)
        .map(|leaf| leaf.path)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(doc: &Document, key: &str) -> Vec<String> {
        find_paths(doc, key).iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_duplicate_keys_in_first_seen_order() {
        let text = "\
lvl1:
  var1: !vault |
    CIPHERBLOCK
  var2: plain
var1: top
";
        let doc = Document::parse(text).unwrap();
        let found = find_paths(&doc, "var1");

        assert_eq!(
            found,
            vec![
                ["lvl1", "var1"].into_iter().collect::<KeyPath>(),
                ["var1"].into_iter().collect::<KeyPath>(),
            ]
        );
    }

    #[test]
    fn test_every_depth() {
        let doc = Document::parse("a:\n  b:\n    k: 1\n  k: 2\nk: 3\nc:\n  k: 4\n").unwrap();
        assert_eq!(paths(&doc, "k"), ["a.b.k", "a.k", "k", "c.k"]);
    }

    #[test]
    fn test_mappings_are_not_targets() {
        let doc = Document::parse("k:\n  inner: 1\nm:\n  k: 2\n").unwrap();
        assert_eq!(paths(&doc, "k"), ["m.k"]);
    }

    #[test]
    fn test_missing_key() {
        let doc = Document::parse("a: 1\n").unwrap();
        assert!(find_paths(&doc, "b").is_empty());
    }
}
