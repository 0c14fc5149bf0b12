//! # Call-Site Scanner
//!
//! Finds the mixin call (`+name(...)`) that surrounds a cursor. The search walks
//! upward from the cursor's line; on each line every `+name(` occurrence is tried
//! left to right, reading forward until the parentheses balance. The first call
//! whose range covers the cursor wins.
//!
//! The reader understands just enough of the embedded JavaScript to balance
//! parentheses: quoted strings (`'`, `"`, `` ` ``) with backslash escapes, and
//! `//` comments that swallow the rest of a line.

use crate::document::{Position, TextBuffer};
use serde::Serialize;
use tracing::{debug, trace};

/// Character that introduces a mixin call in Pug.
pub const CALL_MARKER: char = '+';

/// One located mixin invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSite {
    pub name: String,
    /// Position of the call marker.
    pub start: Position,
    /// Position just after the closing parenthesis.
    pub end: Position,
    /// Source text from the marker through the closing parenthesis, lines
    /// joined with `\n`.
    pub full_text: String,
    /// Text strictly between the outermost parentheses.
    pub args_text: String,
    /// Byte offset of `args_text` within `full_text`.
    pub args_offset: usize,
}

impl CallSite {
    /// Covers the cursor when it lies inside the call or right after `)`.
    pub fn covers(&self, cursor: Position) -> bool {
        self.start <= cursor && cursor <= self.end
    }

    /// Document range of `args_text`: just after `(` up to the closing `)`.
    pub fn args_range(&self) -> (Position, Position) {
        let start = self.position_of(self.args_offset);
        let end = self.position_of(self.args_offset + self.args_text.len());
        (start, end)
    }

    fn position_of(&self, offset: usize) -> Position {
        let before = &self.full_text[..offset];
        match before.rfind('\n') {
            None => Position::new(
                self.start.line,
                self.start.character + before.chars().count(),
            ),
            Some(nl) => Position::new(
                self.start.line + before.matches('\n').count(),
                before[nl + 1..].chars().count(),
            ),
        }
    }
}

/// Locates the call covering `cursor` among `names`.
///
/// Returns `None` when no candidate on the cursor line or any line above it
/// produces a balanced call that covers the cursor.
pub fn locate<S: AsRef<str>>(
    buffer: &TextBuffer,
    cursor: Position,
    names: &[S],
) -> Option<CallSite> {
    let last_line = cursor.line.min(buffer.line_count().saturating_sub(1));

    for line_index in (0..=last_line).rev() {
        let Some(line) = buffer.line(line_index) else {
            continue;
        };

        for (column, name) in find_candidates(line, names) {
            let start = Position::new(line_index, column);
            let Some(call) = read_balanced_call(buffer, start, name) else {
                trace!(%start, name, "candidate never balances");
                continue;
            };
            if call.covers(cursor) {
                debug!(name, start = %call.start, end = %call.end, "located call");
                return Some(call);
            }
        }
    }

    None
}

/// Every `+name(` occurrence on a line as `(char column, name)`, ordered by
/// column. A marker without an immediately following `(` is not a candidate.
fn find_candidates<'n, S: AsRef<str>>(line: &str, names: &'n [S]) -> Vec<(usize, &'n str)> {
    let mut hits = Vec::new();

    for name in names {
        let name = name.as_ref();
        if name.is_empty() {
            continue;
        }
        let needle = format!("{CALL_MARKER}{name}(");
        for (byte_index, _) in line.match_indices(&needle) {
            let column = line[..byte_index].chars().count();
            hits.push((column, name));
        }
    }

    hits.sort_by_key(|&(column, _)| column);
    hits
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    Single,
    Double,
    Backtick,
}

impl Quote {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '\'' => Some(Self::Single),
            '"' => Some(Self::Double),
            '`' => Some(Self::Backtick),
            _ => None,
        }
    }

    fn closes_with(self, c: char) -> bool {
        matches!(
            (self, c),
            (Self::Single, '\'') | (Self::Double, '"') | (Self::Backtick, '`')
        )
    }
}

/// Reads from `start` until the first parenthesis group balances.
fn read_balanced_call(buffer: &TextBuffer, start: Position, name: &str) -> Option<CallSite> {
    let mut text = String::new();
    let mut depth: usize = 0;
    let mut opened = false;
    let mut open_offset = None;
    let mut in_string: Option<Quote> = None;
    let mut escaped = false;

    for line_index in start.line..buffer.line_count() {
        let line = buffer.line(line_index)?;
        let first_column = if line_index == start.line {
            start.character
        } else {
            text.push('\n');
            0
        };

        let mut chars = line.chars().skip(first_column).enumerate().peekable();
        let mut comment_tail = String::new();

        while let Some((i, c)) = chars.next() {
            text.push(c);

            if escaped {
                escaped = false;
                continue;
            }

            if let Some(quote) = in_string {
                if c == '\\' {
                    escaped = true;
                } else if quote.closes_with(c) {
                    in_string = None;
                }
                continue;
            }

            if let Some(quote) = Quote::from_char(c) {
                in_string = Some(quote);
                continue;
            }

            if c == '/' && chars.peek().is_some_and(|&(_, next)| next == '/') {
                // Keep the comment in the text, but stop interpreting it.
                comment_tail.extend(chars.by_ref().map(|(_, c)| c));
                break;
            }

            match c {
                '(' => {
                    if !opened {
                        open_offset = Some(text.len());
                    }
                    depth += 1;
                    opened = true;
                }
                ')' if opened => {
                    depth -= 1;
                    if depth == 0 {
                        let end = Position::new(line_index, first_column + i + 1);
                        let args_offset = open_offset?;
                        let args_end = text.len() - 1;
                        return Some(CallSite {
                            name: name.to_string(),
                            start,
                            end,
                            args_text: text[args_offset..args_end].to_string(),
                            args_offset,
                            full_text: text,
                        });
                    }
                }
                _ => {}
            }
        }

        text.push_str(&comment_tail);
    }

    None
}
