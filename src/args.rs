//! # Argument Interpreter
//!
//! Reads the argument text of a mixin call as if it were the argument list of a
//! JavaScript call. The fragment is wrapped in a synthetic call (`f(...)`),
//! tokenized, and parsed with a small recursive-descent parser that knows
//! string, number and keyword literals, arrays and objects. Any other
//! expression is kept as an opaque span so its presence still counts, but its
//! value is never interpreted.
//!
//! Every span handed out by this module is relative to the original argument
//! text: the parser subtracts the synthetic prefix when it records a span.
//!
//! On top of the parser sit the three shape readers used by the rule kinds:
//! [`parse_positional`], [`parse_options_object`] and [`parse_data_collection`].

use crate::lexer::{self, Token, TokenKind};
use crate::rules::{DataSource, OptionsKeys};
use std::ops::Range;
use thiserror::Error;

pub type Span = Range<usize>;

/// Text placed before the argument text to form a parseable call expression.
const CALL_PREFIX: &str = "f(";
const CALL_SUFFIX: &str = ")";

/// Why an argument list does not have the shape a rule expects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    #[error("Could not parse the arguments as a JavaScript argument list.")]
    Unparsable,
    #[error("Not enough arguments: the first argument ({0}) is missing.")]
    MissingArgument(&'static str),
    #[error(
        "The file argument is not a string literal (variables and expressions are not supported)."
    )]
    FileNotStringLiteral,
    #[error("Expected exactly one argument (an options object), found {0}.")]
    WrongArity(usize),
    #[error("The options argument is not an object literal.")]
    NotAnObject,
    #[error("The options object has no string literal `{pc}` or `{sp}`.")]
    NoOptionsImage { pc: String, sp: String },
    #[error(
        "The first argument is not an array or object literal (variable references are not supported)."
    )]
    NotArrayOrObject,
    #[error("No array element has an image key with a string literal value.")]
    NoUsableItems,
    #[error("The object has no image key with a string literal value.")]
    NoImageKey,
}

/// A parsed expression. Only literal shapes are distinguished.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str { value: String, span: Span },
    Number { span: Span },
    /// `null`, `undefined`, `true` or `false`.
    Keyword { word: String, span: Span },
    Array { elements: Vec<Expr>, span: Span },
    Object { props: Vec<Property>, span: Span },
    /// Anything else: identifiers, calls, operators, templates, spreads.
    Opaque { span: Span },
}

impl Expr {
    pub fn span(&self) -> &Span {
        match self {
            Expr::Str { span, .. }
            | Expr::Number { span }
            | Expr::Keyword { span, .. }
            | Expr::Array { span, .. }
            | Expr::Object { span, .. }
            | Expr::Opaque { span } => span,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expr::Str { value, .. } => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// `None` for computed keys and spreads.
    pub key: Option<String>,
    pub value: Expr,
    pub span: Span,
}

/// Looks up a property by key. Like JavaScript, the last duplicate wins.
fn find_prop<'a>(props: &'a [Property], key: &str) -> Option<&'a Property> {
    props.iter().rev().find(|p| p.key.as_deref() == Some(key))
}

/// Parses `args_text` as the arguments of a call expression.
pub fn parse_call_args(args_text: &str) -> Result<Vec<Expr>, ArgsError> {
    let source = format!("{CALL_PREFIX}{args_text}{CALL_SUFFIX}");
    let tokens = lexer::tokenize(&source).map_err(|_| ArgsError::Unparsable)?;
    let mut parser = Parser {
        source: &source,
        tokens: &tokens,
        pos: 0,
        base: CALL_PREFIX.len(),
    };
    parser.call().ok_or(ArgsError::Unparsable)
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
    /// Length of the synthetic prefix; subtracted from every recorded span.
    base: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn bump(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn expect(&mut self, kind: TokenKind) -> Option<&Token> {
        if self.peek_kind() == Some(kind) {
            self.bump()
        } else {
            None
        }
    }

    fn span(&self, start: usize, end: usize) -> Span {
        start - self.base..end - self.base
    }

    fn text(&self, token: &Token) -> &str {
        &self.source[token.span.clone()]
    }

    /// End offset (in `source`) of the last consumed token.
    fn last_end(&self) -> usize {
        self.tokens[self.pos - 1].span.end
    }

    fn call(&mut self) -> Option<Vec<Expr>> {
        self.expect(TokenKind::Ident)?;
        self.expect(TokenKind::LParen)?;

        let mut args = Vec::new();
        loop {
            if self.expect(TokenKind::RParen).is_some() {
                break;
            }
            args.push(self.expr()?);
            match self.peek_kind()? {
                TokenKind::Comma => {
                    self.bump();
                }
                TokenKind::RParen => {}
                _ => return None,
            }
        }

        // The closing parenthesis must be the synthetic one.
        if self.pos != self.tokens.len() {
            return None;
        }
        Some(args)
    }

    fn at_delimiter(&self) -> bool {
        matches!(
            self.peek_kind(),
            None | Some(
                TokenKind::Comma | TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace
            )
        )
    }

    fn expr(&mut self) -> Option<Expr> {
        let start_pos = self.pos;
        let start = self.peek()?.span.start;

        let literal = match self.peek_kind()? {
            TokenKind::Str => {
                let token = self.bump()?.clone();
                Some(Expr::Str {
                    value: lexer::unquote(self.text(&token)),
                    span: self.span(token.span.start, token.span.end),
                })
            }
            TokenKind::Number => {
                let token = self.bump()?.clone();
                Some(Expr::Number {
                    span: self.span(token.span.start, token.span.end),
                })
            }
            TokenKind::Ident => {
                let token = self.bump()?.clone();
                let word = self.text(&token);
                matches!(word, "null" | "undefined" | "true" | "false").then(|| Expr::Keyword {
                    word: word.to_string(),
                    span: self.span(token.span.start, token.span.end),
                })
            }
            TokenKind::LBracket => Some(self.array()?),
            TokenKind::LBrace => Some(self.object()?),
            _ => None,
        };

        if let Some(literal) = literal {
            if self.at_delimiter() {
                return Some(literal);
            }
        }

        // Not a plain literal: skip to the end of the expression.
        if self.pos == start_pos && self.at_delimiter() {
            return None;
        }
        self.skip_expression()?;
        Some(Expr::Opaque {
            span: self.span(start, self.last_end()),
        })
    }

    /// Consumes tokens up to the next delimiter at the current nesting level.
    fn skip_expression(&mut self) -> Option<()> {
        let mut stack: Vec<TokenKind> = Vec::new();

        loop {
            let kind = match self.peek_kind() {
                None => return stack.is_empty().then_some(()),
                Some(kind) => kind,
            };

            match kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => stack.push(kind),
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    let Some(open) = stack.pop() else {
                        // Closer of an enclosing construct.
                        return Some(());
                    };
                    let matches = matches!(
                        (open, kind),
                        (TokenKind::LParen, TokenKind::RParen)
                            | (TokenKind::LBracket, TokenKind::RBracket)
                            | (TokenKind::LBrace, TokenKind::RBrace)
                    );
                    if !matches {
                        return None;
                    }
                }
                TokenKind::Comma if stack.is_empty() => return Some(()),
                _ => {}
            }
            self.bump();
        }
    }

    fn array(&mut self) -> Option<Expr> {
        let start = self.expect(TokenKind::LBracket)?.span.start;
        let mut elements = Vec::new();

        loop {
            match self.peek_kind()? {
                TokenKind::RBracket => break,
                // Hole: `[a, , b]`.
                TokenKind::Comma => {
                    self.bump();
                    continue;
                }
                _ => elements.push(self.element()?),
            }
            match self.peek_kind()? {
                TokenKind::Comma => {
                    self.bump();
                }
                TokenKind::RBracket => {}
                _ => return None,
            }
        }

        let end = self.bump()?.span.end;
        Some(Expr::Array {
            elements,
            span: self.span(start, end),
        })
    }

    fn element(&mut self) -> Option<Expr> {
        if self.peek_kind() != Some(TokenKind::Spread) {
            return self.expr();
        }
        let start = self.bump()?.span.start;
        self.expr()?;
        Some(Expr::Opaque {
            span: self.span(start, self.last_end()),
        })
    }

    fn object(&mut self) -> Option<Expr> {
        let start = self.expect(TokenKind::LBrace)?.span.start;
        let mut props = Vec::new();

        loop {
            if self.peek_kind()? == TokenKind::RBrace {
                break;
            }
            props.push(self.property()?);
            match self.peek_kind()? {
                TokenKind::Comma => {
                    self.bump();
                }
                TokenKind::RBrace => {}
                _ => return None,
            }
        }

        let end = self.bump()?.span.end;
        Some(Expr::Object {
            props,
            span: self.span(start, end),
        })
    }

    fn property(&mut self) -> Option<Property> {
        let first = self.peek()?.clone();

        let key = match first.kind {
            TokenKind::Spread => {
                let value = self.element()?;
                let span = value.span().clone();
                return Some(Property {
                    key: None,
                    value,
                    span,
                });
            }
            TokenKind::Ident | TokenKind::Number => Some(self.text(&first).to_string()),
            TokenKind::Str => Some(lexer::unquote(self.text(&first))),
            TokenKind::LBracket => None,
            _ => return None,
        };

        if key.is_none() {
            // Computed key: `[expr]: value`.
            self.bump();
            self.skip_expression()?;
            self.expect(TokenKind::RBracket)?;
        } else {
            self.bump();
        }

        let value = if self.expect(TokenKind::Colon).is_some() {
            self.expr()?
        } else if self.at_delimiter() {
            // Shorthand `{ image }`.
            if first.kind != TokenKind::Ident {
                return None;
            }
            Expr::Opaque {
                span: self.span(first.span.start, first.span.end),
            }
        } else {
            // Methods, getters and other forms we only need to step over.
            let from = self.peek()?.span.start;
            self.skip_expression()?;
            Expr::Opaque {
                span: self.span(from, self.last_end()),
            }
        };

        let span = self.span(first.span.start, self.last_end());
        Some(Property { key, value, span })
    }
}

/// Positional shape: `+img("file", alt, width, height)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPositional {
    pub file: String,
    pub arg_count: usize,
    /// Span of every argument within the argument text.
    pub args: Vec<Span>,
}

pub fn parse_positional(args_text: &str) -> Result<ParsedPositional, ArgsError> {
    let args = parse_call_args(args_text)?;
    let first = args.first().ok_or(ArgsError::MissingArgument("file"))?;
    let file = first.as_str().ok_or(ArgsError::FileNotStringLiteral)?;

    Ok(ParsedPositional {
        file: file.to_string(),
        arg_count: args.len(),
        args: args.iter().map(|a| a.span().clone()).collect(),
    })
}

/// Options-object shape: `+picture({ pc: "a.jpg", sp: "a_sp.jpg" })`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedOptionsObject {
    pub obj_span: Span,
    pub pc: Option<String>,
    pub sp: Option<String>,
    pub has_width: bool,
    pub has_height: bool,
    pub has_width_sp: bool,
    pub has_height_sp: bool,
}

pub fn parse_options_object(
    args_text: &str,
    keys: &OptionsKeys,
) -> Result<ParsedOptionsObject, ArgsError> {
    let args = parse_call_args(args_text)?;
    let first = match args.as_slice() {
        [] => return Err(ArgsError::MissingArgument("options")),
        [only] => only,
        more => return Err(ArgsError::WrongArity(more.len())),
    };
    let Expr::Object { props, span } = first else {
        return Err(ArgsError::NotAnObject);
    };

    // An empty path counts as no image.
    let string_value = |key: &str| {
        find_prop(props, key)
            .and_then(|p| p.value.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let has = |key: &str| find_prop(props, key).is_some();

    let parsed = ParsedOptionsObject {
        obj_span: span.clone(),
        pc: string_value(&keys.pc),
        sp: string_value(&keys.sp),
        has_width: has(&keys.pc_width),
        has_height: has(&keys.pc_height),
        has_width_sp: has(&keys.sp_width),
        has_height_sp: has(&keys.sp_height),
    };

    if parsed.pc.is_none() && parsed.sp.is_none() {
        return Err(ArgsError::NoOptionsImage {
            pc: keys.pc.clone(),
            sp: keys.sp.clone(),
        });
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Array,
    Object,
}

/// One image found in a data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMatch {
    pub image: String,
    /// The alias that supplied `image`.
    pub image_key: String,
    pub width_key: String,
    pub height_key: String,
    pub has_width: bool,
    pub has_height: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    pub span: Span,
    pub sources: Vec<SourceMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDataCollection {
    pub kind: CollectionKind,
    pub items: Vec<DataItem>,
}

/// Data-collection shape: an array of objects, or a single object.
pub fn parse_data_collection(
    args_text: &str,
    sources: &[DataSource],
) -> Result<ParsedDataCollection, ArgsError> {
    let args = parse_call_args(args_text)?;
    let first = args.first().ok_or(ArgsError::MissingArgument("data"))?;

    match first {
        Expr::Array { elements, .. } => {
            let items: Vec<DataItem> = elements
                .iter()
                .filter_map(|element| match element {
                    Expr::Object { props, span } => read_item(props, span, sources),
                    _ => None,
                })
                .collect();
            if items.is_empty() {
                return Err(ArgsError::NoUsableItems);
            }
            Ok(ParsedDataCollection {
                kind: CollectionKind::Array,
                items,
            })
        }
        Expr::Object { props, span } => {
            let item = read_item(props, span, sources).ok_or(ArgsError::NoImageKey)?;
            Ok(ParsedDataCollection {
                kind: CollectionKind::Object,
                items: vec![item],
            })
        }
        _ => Err(ArgsError::NotArrayOrObject),
    }
}

fn read_item(props: &[Property], span: &Span, sources: &[DataSource]) -> Option<DataItem> {
    let matches: Vec<SourceMatch> = sources
        .iter()
        .filter_map(|source| {
            let (image_key, image) = source.image_keys.iter().find_map(|alias| {
                let value = find_prop(props, alias)?.value.as_str()?;
                Some((alias.clone(), value.to_string()))
            })?;
            Some(SourceMatch {
                image,
                image_key,
                width_key: source.width_key.clone(),
                height_key: source.height_key.clone(),
                has_width: find_prop(props, &source.width_key).is_some(),
                has_height: find_prop(props, &source.height_key).is_some(),
            })
        })
        .collect();

    (!matches.is_empty()).then(|| DataItem {
        span: span.clone(),
        sources: matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Vec<DataSource> {
        vec![
            DataSource {
                image_keys: vec!["image".to_string(), "imagePc".to_string()],
                width_key: "width".to_string(),
                height_key: "height".to_string(),
            },
            DataSource {
                image_keys: vec!["imageSp".to_string()],
                width_key: "widthSp".to_string(),
                height_key: "heightSp".to_string(),
            },
        ]
    }

    #[test]
    fn test_spans_are_relative_to_args_text() {
        let text = "\"a.jpg\", { w: 1 }";
        let args = parse_call_args(text).unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(&text[args[0].span().clone()], "\"a.jpg\"");
        assert_eq!(&text[args[1].span().clone()], "{ w: 1 }");
    }

    #[test]
    fn test_opaque_expressions_are_kept() {
        let text = "file + \".jpg\", fn(1, [2]), `x${y}`";
        let args = parse_call_args(text).unwrap();
        assert_eq!(args.len(), 3);
        assert!(args.iter().all(|a| matches!(a, Expr::Opaque { .. })));
        assert_eq!(&text[args[1].span().clone()], "fn(1, [2])");
    }

    #[test]
    fn test_trailing_comma_and_empty_args() {
        assert_eq!(parse_call_args("").unwrap(), vec![]);
        assert_eq!(parse_call_args("'a',").unwrap().len(), 1);
    }

    #[test]
    fn test_unbalanced_input_is_unparsable() {
        assert_eq!(parse_call_args("'a', (b"), Err(ArgsError::Unparsable));
        assert_eq!(parse_call_args("'a'), (b"), Err(ArgsError::Unparsable));
        assert_eq!(parse_call_args("{ a: 1 ]"), Err(ArgsError::Unparsable));
        assert_eq!(parse_call_args("'open"), Err(ArgsError::Unparsable));
        assert_eq!(parse_call_args("a,,b"), Err(ArgsError::Unparsable));
    }

    #[test]
    fn test_positional() {
        let parsed = parse_positional("'img/a.jpg', \"alt\", 10").unwrap();
        assert_eq!(parsed.file, "img/a.jpg");
        assert_eq!(parsed.arg_count, 3);
        assert_eq!(parsed.args[2], 20..22);
    }

    #[test]
    fn test_positional_failures() {
        assert_eq!(
            parse_positional(""),
            Err(ArgsError::MissingArgument("file"))
        );
        assert_eq!(
            parse_positional("file, 'alt'"),
            Err(ArgsError::FileNotStringLiteral)
        );
        assert_eq!(
            parse_positional("`a.jpg`"),
            Err(ArgsError::FileNotStringLiteral)
        );
        assert_eq!(parse_positional("'a.jpg"), Err(ArgsError::Unparsable));
    }

    #[test]
    fn test_options_object() {
        let text = "{\n  pc: \"a.jpg\",\n  sp: spImage,\n  \"width\": 10,\n  heightSp: 5\n}";
        let parsed = parse_options_object(text, &OptionsKeys::default()).unwrap();
        assert_eq!(parsed.obj_span, 0..text.len());
        assert_eq!(parsed.pc.as_deref(), Some("a.jpg"));
        assert_eq!(parsed.sp, None);
        assert!(parsed.has_width);
        assert!(!parsed.has_height);
        assert!(!parsed.has_width_sp);
        assert!(parsed.has_height_sp);
    }

    #[test]
    fn test_options_object_failures() {
        let keys = OptionsKeys::default();
        assert_eq!(
            parse_options_object("opts", &keys),
            Err(ArgsError::NotAnObject)
        );
        assert_eq!(
            parse_options_object("{ pc: 'a.jpg' }, 2", &keys),
            Err(ArgsError::WrongArity(2))
        );
        assert!(matches!(
            parse_options_object("{ pc: img, alt: 'x' }", &keys),
            Err(ArgsError::NoOptionsImage { .. })
        ));
        assert_eq!(
            parse_options_object("", &keys),
            Err(ArgsError::MissingArgument("options"))
        );
    }

    #[test]
    fn test_options_object_empty_paths_are_absent() {
        let keys = OptionsKeys::default();
        let parsed = parse_options_object("{ pc: \"a.jpg\", sp: \"\" }", &keys).unwrap();
        assert_eq!(parsed.pc.as_deref(), Some("a.jpg"));
        assert_eq!(parsed.sp, None);
        assert!(matches!(
            parse_options_object("{ pc: \"\", sp: '' }", &keys),
            Err(ArgsError::NoOptionsImage { .. })
        ));
    }

    #[test]
    fn test_comments_and_unicode_between_arguments() {
        let parsed = parse_positional("\"a.jpg\", /* alt */ \"x\"").unwrap();
        assert_eq!(parsed.file, "a.jpg");
        assert_eq!(parsed.arg_count, 2);

        let parsed = parse_positional("\"a.jpg\",\u{3000}\"alt\",\u{00A0}10").unwrap();
        assert_eq!(parsed.arg_count, 3);

        let text = "{ pc: \"a.jpg\", 説明: 1 }";
        let parsed = parse_options_object(text, &OptionsKeys::default()).unwrap();
        assert_eq!(parsed.pc.as_deref(), Some("a.jpg"));
        assert_eq!(parsed.obj_span, 0..text.len());
    }

    #[test]
    fn test_options_object_custom_keys() {
        let keys = OptionsKeys {
            pc: "src".to_string(),
            ..OptionsKeys::default()
        };
        let parsed = parse_options_object("{ src: 'a.png' }", &keys).unwrap();
        assert_eq!(parsed.pc.as_deref(), Some("a.png"));
    }

    #[test]
    fn test_data_collection_array() {
        let text = "[\n  { image: 'a.jpg', width: 1 },\n  { title: 'none' },\n  other,\n  { imagePc: 'b.jpg', imageSp: 'b_sp.jpg' }\n]";
        let parsed = parse_data_collection(text, &sources()).unwrap();
        assert_eq!(parsed.kind, CollectionKind::Array);
        assert_eq!(parsed.items.len(), 2);

        let first = &parsed.items[0];
        assert_eq!(&text[first.span.clone()], "{ image: 'a.jpg', width: 1 }");
        assert_eq!(first.sources.len(), 1);
        assert!(first.sources[0].has_width);
        assert!(!first.sources[0].has_height);

        let second = &parsed.items[1];
        assert_eq!(second.sources.len(), 2);
        assert_eq!(second.sources[0].image, "b.jpg");
        assert_eq!(second.sources[0].image_key, "imagePc");
        assert_eq!(second.sources[1].image, "b_sp.jpg");
        assert_eq!(second.sources[1].width_key, "widthSp");
    }

    #[test]
    fn test_first_alias_with_string_value_wins() {
        let parsed =
            parse_data_collection("{ image: dynamic, imagePc: 'pc.jpg' }", &sources()).unwrap();
        assert_eq!(parsed.kind, CollectionKind::Object);
        assert_eq!(parsed.items[0].sources[0].image, "pc.jpg");
        assert_eq!(parsed.items[0].sources[0].image_key, "imagePc");
    }

    #[test]
    fn test_data_collection_failures() {
        assert_eq!(
            parse_data_collection("[{ title: 'x' }, 1]", &sources()),
            Err(ArgsError::NoUsableItems)
        );
        assert_eq!(
            parse_data_collection("{ title: 'x' }", &sources()),
            Err(ArgsError::NoImageKey)
        );
        assert_eq!(
            parse_data_collection("cards", &sources()),
            Err(ArgsError::NotArrayOrObject)
        );
        assert_eq!(
            parse_data_collection("", &sources()),
            Err(ArgsError::MissingArgument("data"))
        );
    }

    #[test]
    fn test_object_forms_are_tolerated() {
        let text = "{ ...base, [key]: 1, image: 'a.jpg', render() { return 1 }, 'quoted': 2, shorthand }";
        let parsed = parse_data_collection(text, &sources()).unwrap();
        assert_eq!(parsed.items[0].sources[0].image, "a.jpg");
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let parsed = parse_data_collection("{ image: 'a.jpg', image: 'b.jpg' }", &sources()).unwrap();
        assert_eq!(parsed.items[0].sources[0].image, "b.jpg");
    }
}
