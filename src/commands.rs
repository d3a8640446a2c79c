//! Editor-facing operations
//!
//! Every operation takes the current text, re-parses it, and fetches the
//! secret afresh; nothing decrypted outlives the call.

use tracing::{debug, info};

use crate::config::{Config, DEFAULT_VAULT_PATH, VAULT_PATH_KEY};
use crate::document::{Document, KeyPath, Scalar, split_key};
use crate::editor::{DisplaySink, SecretSource, TextSink, TextSource};
use crate::entry::format_entries;
use crate::error::{ErrorCategory, ErrorKind, Result, VaultvarError};
use crate::locate::find_paths;
use crate::patch::{Patch, Replacement, build_patch_indented};
use crate::resolve::{ResolvedLeaf, at_path, resolve, sealed_only};
use crate::seal::Sealer;
use crate::secret::SecretHandle;
use crate::span::leaf_line;

pub struct Operations<'a> {
    secrets: &'a mut dyn SecretSource,
    sealer: &'a dyn Sealer,
    config: &'a Config,
}

impl<'a> Operations<'a> {
    pub fn new(
        secrets: &'a mut dyn SecretSource,
        sealer: &'a dyn Sealer,
        config: &'a Config,
    ) -> Self {
        Self {
            secrets,
            sealer,
            config,
        }
    }

    fn secret(&mut self) -> Result<SecretHandle> {
        self.secrets.get_secret(VAULT_PATH_KEY, DEFAULT_VAULT_PATH)
    }

    /// Unseals every sealed leaf, in pre-order.
    pub fn decrypt_all(&mut self, text: &dyn TextSource) -> Result<Vec<ResolvedLeaf>> {
        let document = Document::parse(&text.lines().join("\n"))?;
        let secret = self.secret()?;
        resolve(&document, &secret, self.sealer, sealed_only)
    }

    /// [`decrypt_all`](Self::decrypt_all) rendered as sorted display lines.
    pub fn decrypt_all_entries(
        &mut self,
        text: &dyn TextSource,
        width: Option<usize>,
    ) -> Result<Vec<String>> {
        let width = match width {
            Some(width) => width,
            None => self.config.width()?,
        };
        let leaves = self.decrypt_all(text)?;
        Ok(format_entries(&leaves, width))
    }

    /// Shows the full value of the leaf declared on `line`.
    pub fn view_secret(
        &mut self,
        text: &dyn TextSource,
        line: usize,
        display: &mut dyn DisplaySink,
    ) -> Result<ResolvedLeaf> {
        let lines = text.lines();
        let document = Document::parse(&lines.join("\n"))?;
        let path = leaf_under_cursor(&lines, &document, line)?;

        let secret = self.secret()?;
        let leaf = resolve(&document, &secret, self.sealer, at_path(&path))?
            .pop()
            .ok_or_else(|| VaultvarError::path_not_found(format!("{} not found", path)))?;
        display.show(&leaf.value)?;
        Ok(leaf)
    }

    /// Seals the plaintext leaf declared on `line` in place.
    pub fn encrypt_under_cursor<B>(&mut self, buffer: &mut B, line: usize) -> Result<Patch>
    where
        B: TextSource + TextSink + ?Sized,
    {
        let lines = buffer.lines();
        let document = Document::parse(&lines.join("\n"))?;
        let path = leaf_under_cursor(&lines, &document, line)?;
        let scalar = scalar_at(&document, &path)?;
        if scalar.sealed {
            return Err(VaultvarError::with_kind(
                ErrorCategory::User,
                ErrorKind::AlreadySealed,
                format!("{} is already encrypted", path),
            )
            .at(path.key(), scalar.line));
        }

        let secret = self.secret()?;
        let block = self.sealer.seal(&scalar.value, &secret)?;
        let patch = build_patch_indented(
            &lines,
            &path,
            &Replacement::Sealed(block),
            self.config.indent()?,
        )?;
        buffer.replace(patch.span, patch.replacement.clone())?;
        info!(%path, line = patch.span.start, "encrypted variable");
        Ok(patch)
    }

    /// Replaces the sealed leaf declared on `line` with its plaintext.
    pub fn decrypt_under_cursor<B>(&mut self, buffer: &mut B, line: usize) -> Result<Patch>
    where
        B: TextSource + TextSink + ?Sized,
    {
        let lines = buffer.lines();
        let document = Document::parse(&lines.join("\n"))?;
        let path = leaf_under_cursor(&lines, &document, line)?;
        let scalar = scalar_at(&document, &path)?;
        if !scalar.sealed {
            return Err(VaultvarError::with_kind(
                ErrorCategory::User,
                ErrorKind::NotSealed,
                format!("{} is not encrypted", path),
            )
            .at(path.key(), scalar.line));
        }

        let secret = self.secret()?;
        let value = self
            .sealer
            .unseal(&scalar.value, &secret)
            .map_err(|e| VaultvarError::decryption(path.key(), scalar.line, e))?;
        let patch = build_patch_indented(
            &lines,
            &path,
            &Replacement::Plain(value),
            self.config.indent()?,
        )?;
        buffer.replace(patch.span, patch.replacement.clone())?;
        info!(%path, line = patch.span.start, "decrypted variable");
        Ok(patch)
    }
}

/// Picks the path of the leaf whose key is on `line` (1-based).
///
/// Every leaf sharing the cursor line's key is a candidate; the one whose
/// computed line equals the cursor wins. A line that declares no leaf is
/// `PathNotFound` however often its key occurs elsewhere.
pub fn leaf_under_cursor<S: AsRef<str>>(
    lines: &[S],
    document: &Document,
    line: usize,
) -> Result<KeyPath> {
    let key = line
        .checked_sub(1)
        .and_then(|idx| lines.get(idx))
        .and_then(|l| split_key(l.as_ref()))
        .map(|(key, _)| key)
        .ok_or_else(|| {
            VaultvarError::path_not_found(format!("no variable declared on line {}", line))
        })?;

    let candidates = find_paths(document, &key);
    let matches: Vec<KeyPath> = candidates
        .iter()
        .filter(|path| leaf_line(lines, path).is_ok_and(|l| l == line))
        .cloned()
        .collect();
    debug!(%key, candidates = candidates.len(), matches = matches.len(), "cursor lookup");

    pick_match(&key, line, matches)
}

/// Leaf lines are unique, so no match means the cursor is not on a leaf;
/// only several matches are ambiguous.
fn pick_match(key: &str, line: usize, mut matches: Vec<KeyPath>) -> Result<KeyPath> {
    match matches.len() {
        0 => Err(VaultvarError::path_not_found(format!(
            "no variable {} on line {}",
            key, line
        ))),
        1 => Ok(matches.remove(0)),
        n => Err(VaultvarError::with_kind(
            ErrorCategory::User,
            ErrorKind::AmbiguousKey,
            format!("{} matches {} variables on line {}", key, n, line),
        )),
    }
}

fn scalar_at<'d>(document: &'d Document, path: &KeyPath) -> Result<&'d Scalar> {
    document
        .leaves()
        .find(|leaf| leaf.path == *path)
        .map(|leaf| leaf.scalar)
        .ok_or_else(|| VaultvarError::path_not_found(format!("{} not found", path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{CapturedDisplay, MemoryBuffer};
    use crate::resolve::tests::FakeSealer;
    use crate::secret::ConstantSecretReader;

    const VARS: &str = "\
lvl1:
  var1: !vault |
      SEALED(inner)
  var2: something
var1: !vault |
    SEALED(top)
plain: text
";

    fn run<T>(f: impl FnOnce(&mut Operations<'_>) -> T) -> T {
        let mut secrets = ConstantSecretReader::new(b"test".to_vec());
        let config = Config::default();
        let mut ops = Operations::new(&mut secrets, &FakeSealer, &config);
        f(&mut ops)
    }

    #[test]
    fn test_decrypt_all_only_sealed() {
        let buffer = MemoryBuffer::from_text(VARS);
        let entries = run(|ops| ops.decrypt_all_entries(&buffer, None)).unwrap();
        assert_eq!(entries, ["2 lvl1.var1: inner", "5 var1: top"]);
    }

    #[test]
    fn test_decrypt_all_aborts_on_failure() {
        let buffer = MemoryBuffer::from_text("a: !vault |\n    SEALED(x)\nb: !vault |\n    GARBAGE\n");
        let err = run(|ops| ops.decrypt_all(&buffer)).unwrap_err();

        assert_eq!(err.kind, Some(ErrorKind::Decryption));
        assert_eq!(err.origin.as_ref().map(|o| o.line), Some(3));
    }

    #[test]
    fn test_view_secret() {
        let buffer = MemoryBuffer::from_text(VARS);
        let mut display = CapturedDisplay::default();
        let leaf = run(|ops| ops.view_secret(&buffer, 5, &mut display)).unwrap();

        assert_eq!(leaf.path.to_string(), "var1");
        assert_eq!(display.shown, ["top"]);
    }

    struct ClosedDisplay;

    impl DisplaySink for ClosedDisplay {
        fn show(&mut self, _content: &str) -> Result<()> {
            Err(VaultvarError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "display closed",
            ))
        }
    }

    #[test]
    fn test_view_secret_reports_display_failure() {
        let buffer = MemoryBuffer::from_text(VARS);
        let err = run(|ops| ops.view_secret(&buffer, 5, &mut ClosedDisplay)).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::Io));
    }

    #[test]
    fn test_cursor_picks_duplicate_by_line() {
        let lines: Vec<&str> = VARS.lines().collect();
        let doc = Document::parse(VARS).unwrap();

        assert_eq!(leaf_under_cursor(&lines, &doc, 2).unwrap().to_string(), "lvl1.var1");
        assert_eq!(leaf_under_cursor(&lines, &doc, 5).unwrap().to_string(), "var1");
    }

    #[test]
    fn test_cursor_off_a_leaf() {
        let lines: Vec<&str> = VARS.lines().collect();
        let doc = Document::parse(VARS).unwrap();

        for line in [0, 1, 3, 99] {
            let err = leaf_under_cursor(&lines, &doc, line).unwrap_err();
            assert_eq!(err.kind, Some(ErrorKind::PathNotFound), "line {}", line);
        }
    }

    #[test]
    fn test_cursor_on_block_content_is_not_found() {
        // A continuation line that looks like `var1:` but is block content.
        let text = "a:\n  var1: x\nvar1: |\n  var1: y\n";
        let lines: Vec<&str> = text.lines().collect();
        let doc = Document::parse(text).unwrap();

        let err = leaf_under_cursor(&lines, &doc, 4).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::PathNotFound));
    }

    #[test]
    fn test_cursor_on_mapping_named_like_leaves() {
        let text = "var1:\n  x: 1\na:\n  var1: 2\nb:\n  var1: 3\n";
        let lines: Vec<&str> = text.lines().collect();
        let doc = Document::parse(text).unwrap();

        let err = leaf_under_cursor(&lines, &doc, 1).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::PathNotFound));
        assert_eq!(leaf_under_cursor(&lines, &doc, 6).unwrap().to_string(), "b.var1");
    }

    #[test]
    fn test_several_matches_are_ambiguous() {
        let matches: Vec<KeyPath> = vec![["a", "k"].into_iter().collect(), ["k"].into_iter().collect()];
        let err = pick_match("k", 3, matches).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::AmbiguousKey));

        let err = pick_match("k", 3, Vec::new()).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::PathNotFound));
    }

    #[test]
    fn test_encrypt_under_cursor() {
        let mut buffer = MemoryBuffer::from_text(VARS);
        let patch = run(|ops| ops.encrypt_under_cursor(&mut buffer, 4)).unwrap();

        assert_eq!(patch.span.start, 4);
        assert_eq!(patch.span.end, 4);
        assert_eq!(
            &buffer.as_lines()[3..6],
            ["  var2: !vault |", "      $FAKE", "      SEALED(something)"]
        );

        let entries = run(|ops| ops.decrypt_all_entries(&buffer, None)).unwrap();
        assert_eq!(
            entries,
            ["2 lvl1.var1: inner", "4 lvl1.var2: something", "7 var1: top"]
        );
    }

    #[test]
    fn test_encrypt_rejects_sealed_leaf() {
        let mut buffer = MemoryBuffer::from_text(VARS);
        let err = run(|ops| ops.encrypt_under_cursor(&mut buffer, 2)).unwrap_err();

        assert_eq!(err.kind, Some(ErrorKind::AlreadySealed));
        assert_eq!(buffer.text(), VARS);
    }

    #[test]
    fn test_decrypt_under_cursor() {
        let mut buffer = MemoryBuffer::from_text(VARS);
        run(|ops| ops.decrypt_under_cursor(&mut buffer, 2)).unwrap();

        assert_eq!(
            buffer.text(),
            "lvl1:\n  var1: inner\n  var2: something\nvar1: !vault |\n    SEALED(top)\nplain: text\n"
        );

        let err = run(|ops| ops.decrypt_under_cursor(&mut buffer, 2)).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::NotSealed));
    }

    #[test]
    fn test_encrypt_then_decrypt_restores_text() {
        let mut buffer = MemoryBuffer::from_text(VARS);
        run(|ops| ops.encrypt_under_cursor(&mut buffer, 7)).unwrap();
        assert_ne!(buffer.text(), VARS);
        run(|ops| ops.decrypt_under_cursor(&mut buffer, 7)).unwrap();
        assert_eq!(buffer.text(), VARS);
    }

    #[test]
    fn test_malformed_document_is_fatal() {
        let mut buffer = MemoryBuffer::from_text("a:\n  - item\n");
        let err = run(|ops| ops.encrypt_under_cursor(&mut buffer, 1)).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::MalformedDocument));
    }
}
