//! Tokenization of binding expressions using logos.
//!
//! Whitespace is skipped. String literals may use single or double quotes
//! and support the escapes `\n \t \r \b \f \v \0 \\ \' \"` and `\uXXXX`.
//!
//! ```
//! use dc_expr::lexer::{tokenize, Token};
//!
//! let tokens = tokenize("a | pipe:'x'", "loc")?;
//! let kinds: Vec<_> = tokens.iter().map(|(t, _)| t.clone()).collect();
//! assert_eq!(kinds[1], Token::Pipe);
//! assert_eq!(kinds[4], Token::Str("x".into()));
//! # Ok::<(), dc_expr::ParseError>(())
//! ```

use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use logos::Logos;

use crate::error::ParseError;

/// A token paired with its byte span in the source.
pub type Spanned = (Token, Range<usize>);

/// Binding expression token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    /// Keyword `true`
    #[token("true")]
    True,
    /// Keyword `false`
    #[token("false")]
    False,
    /// Keyword `null`
    #[token("null")]
    Null,
    /// Keyword `undefined`, evaluates to null
    #[token("undefined")]
    Undefined,

    /// Integer literal
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    /// Float literal (`1.5`, `.5`, `2e10`, `6.02e23`). Integer literals
    /// too large for `i64` also lex as floats.
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    /// String literal, already unescaped
    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r"'([^'\\]|\\.)*'", |lex| unescape(lex.slice()))]
    Str(Rc<str>),

    /// Identifier
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*", |lex| Rc::from(lex.slice()))]
    Ident(Rc<str>),

    /// `===`
    #[token("===")]
    StrictEq,
    /// `!==`
    #[token("!==")]
    StrictNe,
    /// `==`
    #[token("==")]
    Eq,
    /// `!=`
    #[token("!=")]
    Ne,
    /// `<=`
    #[token("<=")]
    Le,
    /// `>=`
    #[token(">=")]
    Ge,
    /// `<`
    #[token("<")]
    Lt,
    /// `>`
    #[token(">")]
    Gt,
    /// `&&`
    #[token("&&")]
    And,
    /// `||`
    #[token("||")]
    Or,
    /// `!`
    #[token("!")]
    Bang,
    /// `+`
    #[token("+")]
    Plus,
    /// `-`
    #[token("-")]
    Minus,
    /// `*`
    #[token("*")]
    Star,
    /// `/`
    #[token("/")]
    Slash,
    /// `%`
    #[token("%")]
    Percent,
    /// `?`
    #[token("?")]
    Question,
    /// `:`
    #[token(":")]
    Colon,
    /// `.`
    #[token(".")]
    Dot,
    /// `,`
    #[token(",")]
    Comma,
    /// `|`
    #[token("|")]
    Pipe,
    /// `(`
    #[token("(")]
    LParen,
    /// `)`
    #[token(")")]
    RParen,
    /// `[`
    #[token("[")]
    LBracket,
    /// `]`
    #[token("]")]
    RBracket,
    /// `{`
    #[token("{")]
    LBrace,
    /// `}`
    #[token("}")]
    RBrace,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Int(i) => return write!(f, "{i}"),
            Self::Float(x) => return write!(f, "{x}"),
            Self::Str(s) => return write!(f, "{s:?}"),
            Self::Ident(name) => return f.write_str(name),
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::StrictEq => "===",
            Self::StrictNe => "!==",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::And => "&&",
            Self::Or => "||",
            Self::Bang => "!",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Question => "?",
            Self::Colon => ":",
            Self::Dot => ".",
            Self::Comma => ",",
            Self::Pipe => "|",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
        };
        f.write_str(text)
    }
}

/// Strips the quotes of a string literal and resolves its escapes.
///
/// Returns `None` for a malformed `\u` escape, which logos reports as an
/// invalid token.
fn unescape(literal: &str) -> Option<Rc<str>> {
    let inner = literal.get(1..literal.len().saturating_sub(1))?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{08}',
            'f' => '\u{0c}',
            'v' => '\u{0b}',
            '0' => '\0',
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return None;
                }
                char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?
            }
            other => other,
        };
        out.push(escaped);
    }
    Some(Rc::from(out))
}

/// Splits `input` into tokens with byte spans.
///
/// `location` only feeds the error message.
pub fn tokenize(input: &str, location: &str) -> Result<Vec<Spanned>, ParseError> {
    tokenize_segment(input, 0..input.len(), location)
}

/// Tokenizes `input[segment]`, reporting spans and error columns relative to
/// the whole of `input`.
pub(crate) fn tokenize_segment(
    input: &str,
    segment: Range<usize>,
    location: &str,
) -> Result<Vec<Spanned>, ParseError> {
    let base = segment.start;
    let text = input.get(segment).unwrap_or_default();
    let mut lexer = Token::lexer(text);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let span = span.start + base..span.end + base;
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                if let Some(value) = overflowed_int(lexer.slice()) {
                    tokens.push((Token::Float(value), span));
                    continue;
                }
                return Err(ParseError::InvalidToken {
                    token: lexer.slice().to_owned(),
                    column: span.start,
                    input: input.to_owned(),
                    location: location.to_owned(),
                });
            }
        }
    }
    Ok(tokens)
}

/// An all-digit slice the `Int` callback rejected, read as a float instead.
fn overflowed_int(slice: &str) -> Option<f64> {
    if slice.is_empty() || !slice.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    slice.parse::<f64>().ok()
}
