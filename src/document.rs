//! # Line-Indexed Document
//!
//! `TextBuffer` is the in-memory view of a source file that the scanner reads
//! and the pipeline edits. It keeps the original text untouched and only
//! records where each line starts, so a `Position` (line + character) can be
//! mapped to a byte offset and back without re-splitting the text.

use anyhow::{Result, anyhow};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// A 0-based location in a document.
///
/// `character` counts Unicode scalar values from the start of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub const fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Humans read 1-based coordinates.
        write!(f, "{}:{}", self.line + 1, self.character + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    /// Byte offset of the first character of every line.
    line_starts: Vec<usize>,
    crlf: bool,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let line_starts = compute_line_starts(&text);
        let crlf = text.contains("\r\n");
        Self {
            text,
            line_starts,
            crlf,
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read '{}': {e}", path.display()))?;
        Ok(Self::new(content))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn uses_crlf(&self) -> bool {
        self.crlf
    }

    /// Returns line `index` without its terminator, or `None` past the end.
    pub fn line(&self, index: usize) -> Option<&str> {
        let start = *self.line_starts.get(index)?;
        let end = self
            .line_starts
            .get(index + 1)
            .map_or(self.text.len(), |next| next - 1);
        let line = &self.text[start..end];
        Some(line.strip_suffix('\r').unwrap_or(line))
    }

    /// Converts a position into a byte offset into `text()`.
    ///
    /// A character past the end of the line clamps to the line end.
    pub fn offset_at(&self, pos: Position) -> Result<usize> {
        let line = self.line(pos.line).ok_or_else(|| {
            anyhow!(
                "Line {} is out of range (document has {} lines)",
                pos.line + 1,
                self.line_count()
            )
        })?;
        let within = line
            .char_indices()
            .nth(pos.character)
            .map_or(line.len(), |(i, _)| i);
        Ok(self.line_starts[pos.line] + within)
    }

    /// Replaces the text between `start` and `end` with `new_text`.
    ///
    /// This is the one mutation a successful insert performs. Line endings of
    /// the inserted text follow the document's style.
    pub fn replace(&mut self, start: Position, end: Position, new_text: &str) -> Result<()> {
        let from = self.offset_at(start)?;
        let to = self.offset_at(end)?;
        if from > to {
            return Err(anyhow!("Replace range {start}..{end} is reversed"));
        }

        let normalized;
        let insert = if self.crlf {
            normalized = new_text.replace("\r\n", "\n").replace('\n', "\r\n");
            normalized.as_str()
        } else {
            new_text
        };

        self.text.replace_range(from..to, insert);
        self.line_starts = compute_line_starts(&self.text);
        Ok(())
    }
}

fn compute_line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}
