//! Nested-mapping document model and parser
//!
//! The accepted syntax is the block-mapping subset of YAML used by
//! variable files: `key: value` lines nested by indentation, literal and
//! folded block scalars, and sealed scalars written as
//!
//! ```text
//! password: !vault |
//!     $VAULTVAR;1;XSALSA20POLY1305
//!     ...
//! ```
//!
//! Sequences, flow collections and multi-document streams are not
//! supported; flow collections are kept as opaque plain values.

use std::fmt;

use indexmap::IndexMap;
use indexmap::map::Iter;
use serde::Serialize;
use tracing::trace;

use crate::error::{Result, VaultvarError};

/// Tag that marks a sealed scalar.
pub const SEALED_TAG: &str = "!vault";

/// A scalar leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    /// Plain value, or the raw cipher block when `sealed`.
    pub value: String,
    pub sealed: bool,
    /// 1-based line of the leaf's key.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mapping {
    line: Option<usize>,
    entries: IndexMap<String, Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Mapping(Mapping),
    Scalar(Scalar),
}

impl Mapping {
    /// 1-based line of the key that opens this mapping; `None` for the root.
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> Iter<'_, String, Node> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered keys from the document root down to one leaf.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn new(keys: Vec<String>) -> Self {
        Self(keys)
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    /// The leaf's own key.
    pub fn key(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }
}

impl<S: Into<String>> FromIterator<S> for KeyPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// A leaf seen during traversal: where it is and what it holds.
#[derive(Debug, Clone)]
pub struct Leaf<'a> {
    pub path: KeyPath,
    pub scalar: &'a Scalar,
}

/// Pre-order traversal over every leaf, in declaration order.
pub struct Leaves<'a> {
    stack: Vec<Iter<'a, String, Node>>,
    path: Vec<String>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = Leaf<'a>;

    fn next(&mut self) -> Option<Leaf<'a>> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                None => {
                    self.stack.pop();
                    self.path.pop();
                }
                Some((key, Node::Mapping(child))) => {
                    self.path.push(key.clone());
                    self.stack.push(child.iter());
                }
                Some((key, Node::Scalar(scalar))) => {
                    let mut keys = self.path.clone();
                    keys.push(key.clone());
                    return Some(Leaf {
                        path: KeyPath(keys),
                        scalar,
                    });
                }
            }
        }
    }
}

/// A parsed document; the root is always a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    root: Mapping,
}

impl Document {
    pub fn parse(text: &str) -> Result<Self> {
        Parser::new(text).run()
    }

    pub fn root(&self) -> &Mapping {
        &self.root
    }

    pub fn leaves(&self) -> Leaves<'_> {
        Leaves {
            stack: vec![self.root.iter()],
            path: Vec::new(),
        }
    }
}

/// Parses `text` into a [`Document`].
pub fn parse(text: &str) -> Result<Document> {
    Document::parse(text)
}

// ---------------------------------------------------------------------------
// Line syntax shared with the line-range mapper.

/// Number of leading spaces.
pub(crate) fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

pub(crate) fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Blank lines and full-line comments.
pub(crate) fn is_ignorable(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Splits a `key: rest` line into its unquoted key and the trimmed rest.
pub(crate) fn split_key(line: &str) -> Option<(String, &str)> {
    let (key, at) = parse_key(line)?;
    Some((key, line[at..].trim()))
}

/// The line up to and including the key's colon, e.g. `"  name:"`.
pub(crate) fn key_prefix(line: &str) -> Option<&str> {
    parse_key(line).map(|(_, at)| &line[..at])
}

/// The unquoted key and the byte offset just past its colon.
fn parse_key(line: &str) -> Option<(String, usize)> {
    let body = line.trim_start();
    let offset = line.len() - body.len();
    if body.starts_with("- ") || body == "-" {
        return None;
    }

    let (key, colon) = match body.chars().next()? {
        quote @ ('"' | '\'') => {
            let close = body[1..].find(quote)? + 1;
            if !body[close + 1..].starts_with(':') {
                return None;
            }
            (body[1..close].to_string(), close + 1)
        }
        _ => {
            let colon = body
                .match_indices(':')
                .map(|(i, _)| i)
                .find(|&i| matches!(body[i + 1..].chars().next(), None | Some(' ')))?;
            (body[..colon].trim_end().to_string(), colon)
        }
    };

    let after = &body[colon + 1..];
    if key.is_empty() || (!after.is_empty() && !after.starts_with(' ')) {
        return None;
    }
    Some((key, offset + colon + 1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chomp {
    Clip,
    Strip,
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueSyntax<'a> {
    /// Nothing after the colon: a nested mapping or an empty scalar.
    Empty,
    Inline(&'a str),
    Block {
        sealed: bool,
        folded: bool,
        chomp: Chomp,
    },
}

fn block_header(header: &str) -> Option<(bool, Chomp)> {
    let mut chars = header.chars();
    let folded = match chars.next()? {
        '|' => false,
        '>' => true,
        _ => return None,
    };
    let chomp = match chars.as_str() {
        "" => Chomp::Clip,
        "-" => Chomp::Strip,
        "+" => Chomp::Keep,
        _ => return None,
    };
    Some((folded, chomp))
}

fn value_syntax(rest: &str) -> std::result::Result<ValueSyntax<'_>, &'static str> {
    if rest.is_empty() {
        return Ok(ValueSyntax::Empty);
    }
    if let Some(after_tag) = rest.strip_prefix(SEALED_TAG) {
        if !after_tag.is_empty() && !after_tag.starts_with(' ') {
            return Ok(ValueSyntax::Inline(rest));
        }
        let (folded, chomp) = block_header(after_tag.trim())
            .ok_or("sealed-block marker must be followed by an indented block")?;
        return Ok(ValueSyntax::Block {
            sealed: true,
            folded,
            chomp,
        });
    }
    match block_header(rest) {
        Some((folded, chomp)) => Ok(ValueSyntax::Block {
            sealed: false,
            folded,
            chomp,
        }),
        None => Ok(ValueSyntax::Inline(rest)),
    }
}

/// Unquotes a plain inline value and drops a trailing comment.
fn inline_value(raw: &str) -> String {
    let bytes = raw.as_bytes();
    if raw.len() >= 2 && bytes[0] == b'\'' && bytes[raw.len() - 1] == b'\'' {
        return raw[1..raw.len() - 1].replace("''", "'");
    }
    if raw.len() >= 2 && bytes[0] == b'"' && bytes[raw.len() - 1] == b'"' {
        let mut out = String::with_capacity(raw.len());
        let mut chars = raw[1..raw.len() - 1].chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        }
        return out;
    }
    match raw.find(" #") {
        Some(i) => raw[..i].trim_end().to_string(),
        None => raw.to_string(),
    }
}

// ---------------------------------------------------------------------------

/// A mapping still being filled.
struct Frame {
    /// Indentation of this mapping's keys, fixed by its first key.
    indent: Option<usize>,
    /// Indentation of the key that opened this mapping.
    key_indent: Option<usize>,
    key: String,
    mapping: Mapping,
}

struct Parser<'t> {
    lines: Vec<&'t str>,
    stack: Vec<Frame>,
    seen_content: bool,
}

impl<'t> Parser<'t> {
    fn new(text: &'t str) -> Self {
        Self {
            lines: text.lines().collect(),
            stack: vec![Frame {
                indent: None,
                key_indent: None,
                key: String::new(),
                mapping: Mapping::default(),
            }],
            seen_content: false,
        }
    }

    fn run(mut self) -> Result<Document> {
        let mut i = 0;
        while i < self.lines.len() {
            let line = self.lines[i];
            let lineno = i + 1;
            i += 1;

            if is_ignorable(line) {
                continue;
            }
            if line.trim_end() == "---" {
                if self.seen_content {
                    return Err(VaultvarError::malformed(
                        lineno,
                        "multiple documents are not supported",
                    ));
                }
                continue;
            }
            self.seen_content = true;

            let leading = &line[..line.len() - line.trim_start().len()];
            if leading.contains('\t') {
                return Err(VaultvarError::malformed(lineno, "tab in indentation"));
            }
            let indent = indent_of(line);
            self.settle(indent, lineno)?;

            let (key, rest) = split_key(line).ok_or_else(|| {
                let what = if line.trim_start().starts_with('-') {
                    "sequence items are not supported"
                } else {
                    "expected a `key: value` line"
                };
                VaultvarError::malformed(lineno, what)
            })?;
            if self.top().mapping.entries.contains_key(&key) {
                return Err(VaultvarError::malformed(
                    lineno,
                    format!("duplicate key {} in the same mapping", key),
                ));
            }

            match value_syntax(rest).map_err(|msg| VaultvarError::malformed(lineno, msg))? {
                ValueSyntax::Inline(raw) => {
                    self.insert(key, inline_value(raw), false, lineno);
                }
                ValueSyntax::Empty => {
                    if self.next_content_indent(i).is_some_and(|next| next > indent) {
                        self.stack.push(Frame {
                            indent: None,
                            key_indent: Some(indent),
                            key,
                            mapping: Mapping {
                                line: Some(lineno),
                                entries: IndexMap::new(),
                            },
                        });
                    } else {
                        self.insert(key, String::new(), false, lineno);
                    }
                }
                ValueSyntax::Block {
                    sealed,
                    folded,
                    chomp,
                } => {
                    let end = self.block_end(i, indent, sealed, lineno)?;
                    let block = &self.lines[i..end];
                    i = end;
                    let value = if sealed {
                        if block.iter().all(|l| is_blank(l)) {
                            return Err(VaultvarError::malformed(
                                lineno,
                                format!("{} marker has no indented content", SEALED_TAG),
                            ));
                        }
                        block
                            .iter()
                            .map(|l| l.trim())
                            .filter(|l| !l.is_empty())
                            .collect::<Vec<_>>()
                            .join("\n")
                    } else {
                        block_value(block, folded, chomp)
                    };
                    self.insert(key, value, sealed, lineno);
                }
            }
        }

        while self.stack.len() > 1 {
            self.pop();
        }
        let root = self.stack.pop().map(|f| f.mapping).unwrap_or_default();
        trace!(lines = self.lines.len(), keys = root.len(), "parsed document");
        Ok(Document { root })
    }

    fn top(&mut self) -> &mut Frame {
        // The root frame is never popped before the end of `run`.
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    /// Closes mappings until one accepts keys at `indent`.
    fn settle(&mut self, indent: usize, lineno: usize) -> Result<()> {
        loop {
            let (level, key_indent) = {
                let top = self.top();
                (top.indent, top.key_indent)
            };
            match level {
                None => {
                    if key_indent.is_some_and(|k| indent <= k) {
                        return Err(VaultvarError::malformed(lineno, "expected a nested key"));
                    }
                    self.top().indent = Some(indent);
                    return Ok(());
                }
                Some(level) if indent == level => return Ok(()),
                Some(level) if indent < level && self.stack.len() > 1 => self.pop(),
                Some(_) => {
                    return Err(VaultvarError::malformed(
                        lineno,
                        "indentation does not match any enclosing mapping",
                    ));
                }
            }
        }
    }

    fn pop(&mut self) {
        if let Some(frame) = self.stack.pop() {
            self.top()
                .mapping
                .entries
                .insert(frame.key, Node::Mapping(frame.mapping));
        }
    }

    fn insert(&mut self, key: String, value: String, sealed: bool, line: usize) {
        self.top().mapping.entries.insert(
            key,
            Node::Scalar(Scalar {
                value,
                sealed,
                line,
            }),
        );
    }

    fn next_content_indent(&self, from: usize) -> Option<usize> {
        self.lines[from..]
            .iter()
            .find(|l| !is_ignorable(l))
            .map(|l| indent_of(l))
    }

    /// Index one past the last line of the block starting at `from`.
    fn block_end(&self, from: usize, key_indent: usize, sealed: bool, lineno: usize) -> Result<usize> {
        let mut end = from;
        let mut j = from;
        while j < self.lines.len() {
            let line = self.lines[j];
            if is_blank(line) {
                let resumes = self.lines[j..]
                    .iter()
                    .find(|l| !is_blank(l))
                    .is_some_and(|l| indent_of(l) > key_indent);
                if !resumes {
                    break;
                }
                if sealed {
                    return Err(VaultvarError::malformed(
                        j + 1,
                        format!("blank line inside the sealed block opened at line {}", lineno),
                    ));
                }
            } else if indent_of(line) <= key_indent {
                break;
            } else {
                end = j + 1;
            }
            j += 1;
        }
        Ok(end)
    }
}

fn block_value(block: &[&str], folded: bool, chomp: Chomp) -> String {
    let base = block
        .iter()
        .filter(|l| !is_blank(l))
        .map(|l| indent_of(l))
        .min()
        .unwrap_or(0);
    let lines: Vec<&str> = block
        .iter()
        .map(|l| if is_blank(l) { "" } else { &l[base..] })
        .collect();
    let mut value = lines.join(if folded { " " } else { "\n" });
    if !value.is_empty() && chomp != Chomp::Strip {
        value.push('\n');
    }
    value
}
