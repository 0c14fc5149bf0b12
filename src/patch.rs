//! # Structural Patcher
//!
//! Text-level rewrites of a call's argument text. Nothing here re-serializes a
//! syntax tree: values are spliced into the original text so indentation,
//! comments and everything not being touched survive byte for byte.
//!
//! Edits are expressed as [`Replacement`]s against one snapshot of the text and
//! applied with [`apply_descending`], highest offset first, so an applied
//! replacement never moves a span still waiting to be applied.

use crate::args::Span;
use crate::scale::ScaledSize;
use fancy_regex::Regex;

/// Replaces `span` of some text snapshot with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub span: Span,
    pub text: String,
}

impl Replacement {
    pub fn new(span: Span, text: impl Into<String>) -> Self {
        Self {
            span,
            text: text.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::new(at..at, text)
    }
}

/// Applies replacements computed against `text`, highest start offset first.
pub fn apply_descending(text: &str, mut replacements: Vec<Replacement>) -> String {
    replacements.sort_by(|a, b| b.span.start.cmp(&a.span.start));
    let mut out = text.to_string();
    for replacement in replacements {
        out.replace_range(replacement.span, &replacement.text);
    }
    out
}

/// Literal values that count as "no value yet" and are filled even when
/// existing values are not overwritten.
pub fn is_empty_literal(value: &str) -> bool {
    matches!(
        value.trim(),
        "" | "null" | "undefined" | "\"\"" | "''" | "``"
    )
}

/// Writes width and height into positional slots 3 and 4.
///
/// `args` are the spans of the existing top-level arguments. Missing slots are
/// inserted after the last argument; when only the file is present an empty
/// alt text in the file's quote style keeps width and height in place.
pub fn patch_positional(
    args_text: &str,
    args: &[Span],
    size: ScaledSize,
    overwrite: bool,
) -> String {
    let (width, height) = (size.width.to_string(), size.height.to_string());
    let fill = |span: &Span, value: &str| {
        (overwrite || is_empty_literal(&args_text[span.clone()]))
            .then(|| Replacement::new(span.clone(), value))
    };

    let mut replacements = Vec::new();
    match args {
        [] => return args_text.to_string(),
        [file] => {
            let quote = if args_text[file.clone()].starts_with('\'') {
                '\''
            } else {
                '"'
            };
            replacements.push(Replacement::insert(
                file.end,
                format!(", {quote}{quote}, {width}, {height}"),
            ));
        }
        [_, alt] => {
            replacements.push(Replacement::insert(alt.end, format!(", {width}, {height}")));
        }
        [_, _, w] => {
            replacements.extend(fill(w, &width));
            replacements.push(Replacement::insert(w.end, format!(", {height}")));
        }
        [_, _, w, h, ..] => {
            replacements.extend(fill(w, &width));
            replacements.extend(fill(h, &height));
        }
    }

    apply_descending(args_text, replacements)
}

/// One `key: value` property to write into an object literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropEdit {
    pub key: String,
    pub value: String,
}

impl PropEdit {
    pub fn new(key: impl Into<String>, value: impl ToString) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

impl std::fmt::Display for PropEdit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.value)
    }
}

/// Writes `edits` into the object literal `obj_src` (`{` through `}`).
///
/// An existing top-level key keeps its spelling and spacing and only has its
/// value replaced. A missing key is appended before the closing brace.
pub fn patch_object(obj_src: &str, edits: &[PropEdit], overwrite: bool) -> String {
    let mut result = obj_src.to_string();

    for edit in edits {
        match find_value(&result, &edit.key) {
            Some(span) => {
                if overwrite || is_empty_literal(&result[span.clone()]) {
                    result.replace_range(span, &edit.value);
                }
            }
            None => result = append_prop(&result, &edit.to_string()),
        }
    }

    result
}

/// What a byte of source text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    /// Code at a bracket depth. Openers carry the outer depth, closers the
    /// inner one, quotes the depth of the string literal.
    Code(usize),
    Literal,
    Comment,
}

fn classify(text: &str) -> Vec<Class> {
    enum State {
        Code,
        Str(u8),
        LineComment,
        BlockComment,
    }

    let bytes = text.as_bytes();
    let mut classes = Vec::with_capacity(bytes.len());
    let mut state = State::Code;
    let mut depth = 0usize;
    let mut escaped = false;
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        let next = bytes.get(i + 1).copied();

        match state {
            State::Str(quote) => {
                if escaped {
                    escaped = false;
                    classes.push(Class::Literal);
                } else if byte == b'\\' {
                    escaped = true;
                    classes.push(Class::Literal);
                } else if byte == quote {
                    state = State::Code;
                    classes.push(Class::Code(depth));
                } else {
                    classes.push(Class::Literal);
                }
            }
            State::LineComment => {
                if byte == b'\n' {
                    state = State::Code;
                    classes.push(Class::Code(depth));
                } else {
                    classes.push(Class::Comment);
                }
            }
            State::BlockComment => {
                classes.push(Class::Comment);
                if byte == b'*' && next == Some(b'/') {
                    classes.push(Class::Comment);
                    state = State::Code;
                    i += 1;
                }
            }
            State::Code => match byte {
                b'"' | b'\'' | b'`' => {
                    classes.push(Class::Code(depth));
                    state = State::Str(byte);
                }
                b'/' if next == Some(b'/') => {
                    classes.push(Class::Comment);
                    state = State::LineComment;
                }
                b'/' if next == Some(b'*') => {
                    classes.extend([Class::Comment, Class::Comment]);
                    state = State::BlockComment;
                    i += 1;
                }
                b'{' | b'[' | b'(' => {
                    classes.push(Class::Code(depth));
                    depth += 1;
                }
                b'}' | b']' | b')' => {
                    classes.push(Class::Code(depth));
                    depth = depth.saturating_sub(1);
                }
                _ => classes.push(Class::Code(depth)),
            },
        }
        i += 1;
    }

    classes
}

/// Span of the value of top-level property `key` in `obj_src`, if present.
/// With duplicate keys the last one is used, as JavaScript would.
fn find_value(obj_src: &str, key: &str) -> Option<Span> {
    let pattern = format!(r#"(?<![\w$])(["']?){}\1\s*:\s*"#, regex::escape(key));
    let re = Regex::new(&pattern).ok()?;
    let classes = classify(obj_src);

    let value_start = re
        .find_iter(obj_src)
        .filter_map(Result::ok)
        .filter(|m| classes[m.start()] == Class::Code(1))
        .filter(|m| starts_property(obj_src, &classes, m.start()))
        .last()?
        .end();

    let bytes = obj_src.as_bytes();
    let mut end = value_start;
    while end < bytes.len() {
        let stop = match classes[end] {
            Class::Comment => true,
            Class::Code(1) => matches!(bytes[end], b',' | b'}' | b'\n'),
            _ => false,
        };
        if stop {
            break;
        }
        end += 1;
    }

    let value = obj_src[value_start..end].trim_end();
    Some(value_start..value_start + value.len())
}

/// Whether a key at `pos` begins a property, i.e. only whitespace and comments
/// separate it from the opening brace or a top-level comma.
fn starts_property(obj_src: &str, classes: &[Class], pos: usize) -> bool {
    for (i, c) in obj_src[..pos].char_indices().rev() {
        if classes[i] == Class::Comment || c.is_whitespace() {
            continue;
        }
        return matches!((c, classes[i]), ('{', Class::Code(0)) | (',', Class::Code(1)));
    }
    false
}

/// Appends `prop` as the last property of the object literal `obj_src`.
fn append_prop(obj_src: &str, prop: &str) -> String {
    let Some(close) = obj_src.rfind('}') else {
        return obj_src.to_string();
    };
    let close_line_start = obj_src[..close].rfind('\n').map(|nl| nl + 1);

    match close_line_start {
        Some(line_start) if obj_src[line_start..close].trim().is_empty() => {
            append_line(obj_src, line_start, prop)
        }
        // Single line, or the closing brace shares a line with a property.
        _ => append_inline(obj_src, close, prop),
    }
}

fn append_inline(obj_src: &str, close: usize, prop: &str) -> String {
    let head = obj_src[..close].trim_end();
    let gap = &obj_src[head.len()..close];
    let tail = &obj_src[close..];

    if head.ends_with('{') {
        format!("{head} {prop} {}", tail.trim_start())
    } else if head.ends_with(',') {
        format!("{head} {prop}{gap}{tail}")
    } else {
        format!("{head}, {prop}{gap}{tail}")
    }
}

/// Inserts `prop` on its own line above the closing-brace line that starts
/// at `close_line_start`.
fn append_line(obj_src: &str, close_line_start: usize, prop: &str) -> String {
    let classes = classify(obj_src);
    let close_indent = leading_whitespace(&obj_src[close_line_start..]);

    let body_indent = obj_src[..close_line_start]
        .split('\n')
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .last()
        .map(leading_whitespace);
    let indent = match body_indent {
        Some(indent) => indent.to_string(),
        None if close_indent.contains('\t') => format!("{close_indent}\t"),
        None => format!("{close_indent}  "),
    };

    // Last code character before the closing line decides the comma.
    let last_code = (0..close_line_start).rev().find(|&i| {
        matches!(classes[i], Class::Code(_)) && !obj_src.as_bytes()[i].is_ascii_whitespace()
    });
    let comma_at = last_code.filter(|&i| !matches!(obj_src.as_bytes()[i], b'{' | b'[' | b'(' | b','));

    let mut out = String::with_capacity(obj_src.len() + prop.len() + indent.len() + 2);
    match comma_at {
        Some(i) => {
            out.push_str(&obj_src[..=i]);
            out.push(',');
            out.push_str(&obj_src[i + 1..close_line_start]);
        }
        None => out.push_str(&obj_src[..close_line_start]),
    }
    out.push_str(&indent);
    out.push_str(prop);
    out.push('\n');
    out.push_str(&obj_src[close_line_start..]);
    out
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}
