//! Mapping key paths back onto the original lines
//!
//! Line numbers here are 1-based, matching [`Scalar::line`] and the
//! numbers shown to the user. [`LineSpan::to_range`] converts to a
//! 0-based range for splicing a line buffer.
//!
//! [`Scalar::line`]: crate::document::Scalar::line

use std::ops::Range;

use serde::Serialize;

use crate::document::{KeyPath, indent_of, is_blank, is_ignorable, split_key};
use crate::error::{Result, VaultvarError};

/// An inclusive, 1-based run of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

impl LineSpan {
    pub fn single(line: usize) -> Self {
        Self {
            start: line,
            end: line,
        }
    }

    pub fn contains(&self, line: usize) -> bool {
        (self.start..=self.end).contains(&line)
    }

    /// The same lines as a 0-based, half-open index range.
    pub fn to_range(&self) -> Range<usize> {
        self.start - 1..self.end
    }
}

/// Returns the 1-based line where the leaf at `path` is declared.
///
/// Each path element must be a key at the direct-child indentation of the
/// line matched for the previous element.
pub fn leaf_line<S: AsRef<str>>(lines: &[S], path: &KeyPath) -> Result<usize> {
    if path.keys().is_empty() {
        return Err(VaultvarError::path_not_found("empty key path"));
    }

    let mut parent: Option<(usize, usize)> = None;
    for wanted in path.keys() {
        let from = parent.map_or(0, |(idx, _)| idx + 1);
        let found = find_child(lines, from, parent.map(|(_, indent)| indent), wanted)
            .ok_or_else(|| {
                VaultvarError::path_not_found(format!("{} not found in the current text", path))
            })?;
        parent = Some((found, indent_of(lines[found].as_ref())));
    }

    let (idx, indent) = parent.unwrap_or_default();
    let opens_mapping = split_key(lines[idx].as_ref()).is_some_and(|(_, rest)| rest.is_empty())
        && next_content(lines, idx + 1).is_some_and(|next| indent_of(next) > indent);
    if opens_mapping {
        return Err(VaultvarError::path_not_found(format!(
            "{} is a mapping, not a leaf",
            path
        )));
    }
    Ok(idx + 1)
}

/// Index of the line declaring `wanted` among the children of the
/// mapping whose key is indented by `parent_indent` (`None` for the root).
fn find_child<S: AsRef<str>>(
    lines: &[S],
    from: usize,
    parent_indent: Option<usize>,
    wanted: &str,
) -> Option<usize> {
    let mut level = None;
    for (idx, line) in lines.iter().enumerate().skip(from) {
        let line = line.as_ref();
        if is_ignorable(line) || line.trim_end() == "---" {
            continue;
        }
        let indent = indent_of(line);
        if parent_indent.is_some_and(|p| indent <= p) {
            return None;
        }
        let child_level = *level.get_or_insert(indent);
        if indent < child_level {
            return None;
        }
        if indent == child_level && split_key(line).is_some_and(|(key, _)| key == wanted) {
            return Some(idx);
        }
    }
    None
}

fn next_content<S: AsRef<str>>(lines: &[S], from: usize) -> Option<&str> {
    lines
        .iter()
        .skip(from)
        .map(|l| l.as_ref())
        .find(|l: &&str| !is_ignorable(l))
}

/// Returns the lines making up the leaf declared on `start` (1-based).
///
/// The span covers the key line and every following line indented deeper
/// than it, and closes at a blank line, the end of the text, or a line at
/// the key's indentation or shallower. Blank lines only continue the span
/// inside a plain `|`/`>` block; anywhere else a blank line followed by
/// deeper content is a malformed document.
pub fn leaf_span<S: AsRef<str>>(lines: &[S], start: usize) -> Result<LineSpan> {
    if start == 0 || start > lines.len() {
        return Err(VaultvarError::path_not_found(format!(
            "line {} is outside the document",
            start
        )));
    }

    let key_line = lines[start - 1].as_ref();
    let key_indent = indent_of(key_line);
    let plain_block = split_key(key_line).is_some_and(|(_, rest)| {
        matches!(rest.chars().next(), Some('|' | '>'))
    });

    let mut end = start;
    for (idx, line) in lines.iter().enumerate().skip(start) {
        let line = line.as_ref();
        if is_blank(line) {
            let resumes = lines[idx..]
                .iter()
                .map(|l| l.as_ref())
                .find(|l: &&str| !is_blank(l))
                .is_some_and(|l| indent_of(l) > key_indent);
            if !resumes {
                break;
            }
            if !plain_block {
                return Err(VaultvarError::malformed(
                    idx + 1,
                    format!("blank line inside the block of line {}", start),
                ));
            }
            continue;
        }
        if indent_of(line) <= key_indent {
            break;
        }
        end = idx + 1;
    }
    Ok(LineSpan { start, end })
}
