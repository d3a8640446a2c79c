//! Replacement spans for sealing and unsealing a leaf in place
//!
//! Building a patch never touches the text; the caller deletes
//! `span.start..=span.end` and inserts `replacement` in its place.

use tracing::debug;

use crate::document::{KeyPath, SEALED_TAG, indent_of, key_prefix};
use crate::error::{Result, VaultvarError};
use crate::span::{LineSpan, leaf_line, leaf_span};

/// Indentation added in front of block lines, relative to their key.
pub const DEFAULT_INDENT: usize = 4;

/// The new textual form of a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Cipher block lines, placed under a sealed-block marker.
    Sealed(Vec<String>),
    /// Plaintext, inlined on the key line when it has no line breaks.
    Plain(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub span: LineSpan,
    pub replacement: Vec<String>,
}

impl Patch {
    /// Splices the patch into an in-memory line buffer.
    pub fn apply(&self, lines: &mut Vec<String>) -> Result<()> {
        if self.span.start == 0 || self.span.end > lines.len() {
            return Err(VaultvarError::path_not_found(format!(
                "lines {}-{} are outside the document",
                self.span.start, self.span.end
            )));
        }
        lines.splice(self.span.to_range(), self.replacement.iter().cloned());
        Ok(())
    }
}

/// Builds the patch replacing the leaf at `path` with `replacement`.
pub fn build_patch<S: AsRef<str>>(
    lines: &[S],
    path: &KeyPath,
    replacement: &Replacement,
) -> Result<Patch> {
    build_patch_indented(lines, path, replacement, DEFAULT_INDENT)
}

/// Like [`build_patch`], with block lines indented by `indent_unit` spaces.
pub fn build_patch_indented<S: AsRef<str>>(
    lines: &[S],
    path: &KeyPath,
    replacement: &Replacement,
    indent_unit: usize,
) -> Result<Patch> {
    let start = leaf_line(lines, path)?;
    let span = leaf_span(lines, start)?;

    let key_line = lines[start - 1].as_ref();
    let prefix = key_prefix(key_line).ok_or_else(|| {
        VaultvarError::path_not_found(format!("line {} no longer declares {}", start, path))
    })?;
    let block_indent = " ".repeat(indent_of(key_line) + indent_unit);

    let replacement: Vec<String> = match replacement {
        Replacement::Sealed(block) => std::iter::once(format!("{} {} |", prefix, SEALED_TAG))
            .chain(block.iter().map(|l| format!("{}{}", block_indent, l)))
            .collect(),
        Replacement::Plain(text) => plain_lines(prefix, &block_indent, text),
    };

    debug!(%path, start = span.start, end = span.end, lines = replacement.len(), "built patch");
    Ok(Patch { span, replacement })
}

fn plain_lines(prefix: &str, block_indent: &str, text: &str) -> Vec<String> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    if !body.contains('\n') && body.len() == text.len() {
        return vec![format!("{} {}", prefix, inline_scalar(text))];
    }

    let header = if body.len() == text.len() { "|-" } else { "|" };
    std::iter::once(format!("{} {}", prefix, header))
        .chain(body.split('\n').map(|l| {
            if l.is_empty() {
                String::new()
            } else {
                format!("{}{}", block_indent, l)
            }
        }))
        .collect()
}

/// Quotes a single-line value when the plain form would read differently.
fn inline_scalar(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value != value.trim()
        || value.contains(" #")
        || value.contains(": ")
        || value.ends_with(':')
        || value.starts_with(|c: char| "!&*|>'\"#%@`{[-?,".contains(c));
    if needs_quotes {
        format!("'{}'", value.replace('\'', "''"))
    } else {
        value.to_string()
    }
}
