//! Logos-based lexer for the JavaScript-like argument fragments of a mixin call.
//!
//! Only the token classes the argument interpreter cares about are told apart;
//! everything else becomes `Punct` so arbitrary expressions can still be
//! skipped over. Whitespace and comments are trivia and never reach the parser.

use logos::{FilterResult, Lexer, Logos};
use std::ops::Range;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[\p{White_Space}\u{FEFF}]+")]
#[logos(skip r"//[^\n]*")]
pub enum TokenKind {
    /// Never emitted; the callback skips the comment or fails when it is
    /// not closed.
    #[token("/*", block_comment)]
    BlockComment,

    #[regex(r#""([^"\\\n]|\\(.|\n))*""#)]
    #[regex(r#"'([^'\\\n]|\\(.|\n))*'"#)]
    Str,

    #[regex(r"`([^`\\]|\\(.|\n))*`")]
    Template,

    #[regex(r"[0-9][0-9_]*(\.[0-9_]*)?([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?")]
    #[regex(r"0[xX][0-9a-fA-F_]+")]
    Number,

    #[regex(r"[\p{ID_Start}$_][\p{ID_Continue}$\u{200C}\u{200D}]*")]
    Ident,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("...")]
    Spread,

    #[regex(r"[.;?!~%^&|*/+\-<>=@#]")]
    Punct,
}

fn block_comment(lex: &mut Lexer<TokenKind>) -> FilterResult<(), ()> {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            FilterResult::Skip
        }
        None => FilterResult::Error(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

/// Tokenizes `input`, or returns the byte offset of the first character that
/// does not start a token (an unterminated string, for example).
pub fn tokenize(input: &str) -> Result<Vec<Token>, usize> {
    let mut lexer = TokenKind::lexer(input);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                span: lexer.span(),
            }),
            Err(()) => return Err(lexer.span().start),
        }
    }

    Ok(tokens)
}

/// Decodes the value of a quoted string literal token, escapes included.
pub fn unquote(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            break;
        };
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            // Line continuation.
            '\n' => {}
            'x' => push_hex(&mut out, &mut chars, 2),
            'u' if chars.peek() == Some(&'{') => {
                chars.next();
                let digits: String = chars.by_ref().take_while(|&d| d != '}').collect();
                push_code_point(&mut out, &digits);
            }
            'u' => push_hex(&mut out, &mut chars, 4),
            other => out.push(other),
        }
    }

    out
}

fn push_hex(out: &mut String, chars: &mut std::iter::Peekable<std::str::Chars<'_>>, len: usize) {
    let digits: String = (0..len).filter_map(|_| chars.next()).collect();
    push_code_point(out, &digits);
}

fn push_code_point(out: &mut String, digits: &str) {
    match u32::from_str_radix(digits, 16).ok().and_then(char::from_u32) {
        Some(c) => out.push(c),
        None => out.push(char::REPLACEMENT_CHARACTER),
    }
}
