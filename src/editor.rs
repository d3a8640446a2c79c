//! Collaborators the operations are driven through.
//!
//! An editor plugin implements these over its buffers and windows; the
//! command-line front end and the tests use [`MemoryBuffer`].

pub use crate::config::ConfigSource;
pub use crate::secret::SecretSource;

use crate::error::Result;
use crate::patch::Patch;
use crate::span::LineSpan;

/// The current text of the document being edited.
pub trait TextSource {
    fn lines(&self) -> Vec<String>;
}

/// Accepts in-place replacements of a line span.
pub trait TextSink {
    fn replace(&mut self, span: LineSpan, lines: Vec<String>) -> Result<()>;
}

/// A side view for showing content that does not fit the document.
pub trait DisplaySink {
    fn show(&mut self, content: &str) -> Result<()>;
}

/// Line buffer backing both text traits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBuffer {
    lines: Vec<String>,
    /// Line terminator of the loaded text, `"\n"` or `"\r\n"`.
    line_ending: &'static str,
    /// Whether the text ended with a newline when loaded.
    trailing_newline: bool,
}

impl MemoryBuffer {
    /// Splits `text` into lines; the first line terminator decides
    /// whether the buffer writes back LF or CRLF.
    pub fn from_text(text: &str) -> Self {
        let crlf = text
            .find('\n')
            .is_some_and(|i| text[..i].ends_with('\r'));
        Self {
            lines: text.lines().map(str::to_string).collect(),
            line_ending: if crlf { "\r\n" } else { "\n" },
            trailing_newline: text.is_empty() || text.ends_with('\n'),
        }
    }

    /// The buffer joined back into text.
    pub fn text(&self) -> String {
        let mut text = self.lines.join(self.line_ending);
        if self.trailing_newline && !self.lines.is_empty() {
            text.push_str(self.line_ending);
        }
        text
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }
}

impl TextSource for MemoryBuffer {
    fn lines(&self) -> Vec<String> {
        self.lines.clone()
    }
}

impl TextSink for MemoryBuffer {
    fn replace(&mut self, span: LineSpan, lines: Vec<String>) -> Result<()> {
        Patch {
            span,
            replacement: lines,
        }
        .apply(&mut self.lines)
    }
}

/// Collects everything shown, one entry per call.
#[derive(Debug, Clone, Default)]
pub struct CapturedDisplay {
    pub shown: Vec<String>,
}

impl DisplaySink for CapturedDisplay {
    fn show(&mut self, content: &str) -> Result<()> {
        self.shown.push(content.to_string());
        Ok(())
    }
}
