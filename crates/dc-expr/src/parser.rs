//! Recursive descent parser for binding expressions and interpolations.
//!
//! Precedence, lowest to highest:
//!
//! | level          | operators                      | associativity |
//! |----------------|--------------------------------|---------------|
//! | conditional    | `?:`                           | right         |
//! | logical or     | `\|\|`                         | left          |
//! | logical and    | `&&`                           | left          |
//! | equality       | `== != === !==`                | left          |
//! | relational     | `< > <= >=`                    | left          |
//! | additive       | `+ -`                          | left          |
//! | multiplicative | `* / %`                        | left          |
//! | unary          | `! - +`                        | prefix        |
//! | pipe           | `\| name:arg:arg`              | left          |
//! | postfix        | `.name` `.name()` `()` `[key]` | left          |
//!
//! Pipe arguments are parsed at postfix level; wrap anything looser in
//! parentheses (`value | fmt:(a + b)`).

use std::rc::Rc;

use dc_core::{FxHashMap, Value};
use tracing::{debug, trace};

use crate::ast::{Ast, AstWithSource, BinaryOp, UnaryOp};
use crate::error::ParseError;
use crate::lexer::{tokenize_segment, Spanned, Token};

const EXPRESSION: &str = "an expression";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Binding,
    Interpolation,
}

/// Parses expression source into shared [`AstWithSource`] trees.
///
/// Results are cached by `(kind, input, location)`, so compiling the same
/// template twice hands out the same tree.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use dc_expr::Parser;
///
/// let mut parser = Parser::new();
/// let a = parser.parse_binding("name", "Person")?;
/// let b = parser.parse_binding("name", "Person")?;
/// assert!(Rc::ptr_eq(&a, &b));
///
/// let greeting = parser.parse_interpolation("Hello {{name}}!", "Person")?;
/// assert_eq!(greeting.to_string(), "Hello {{name}}!");
/// # Ok::<(), dc_expr::ParseError>(())
/// ```
#[derive(Debug, Default)]
pub struct Parser {
    cache: FxHashMap<(Kind, String, String), Rc<AstWithSource>>,
}

impl Parser {
    /// Creates a parser with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a single binding expression.
    pub fn parse_binding(
        &mut self,
        input: &str,
        location: &str,
    ) -> Result<Rc<AstWithSource>, ParseError> {
        self.parse(Kind::Binding, input, location)
    }

    /// Parses text with embedded `{{expression}}` segments.
    ///
    /// Text without any `{{` parses to a literal-only interpolation that
    /// evaluates to the text itself.
    pub fn parse_interpolation(
        &mut self,
        input: &str,
        location: &str,
    ) -> Result<Rc<AstWithSource>, ParseError> {
        self.parse(Kind::Interpolation, input, location)
    }

    /// Number of cached trees.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn parse(
        &mut self,
        kind: Kind,
        input: &str,
        location: &str,
    ) -> Result<Rc<AstWithSource>, ParseError> {
        let key = (kind, input.to_owned(), location.to_owned());
        if let Some(hit) = self.cache.get(&key) {
            trace!(input, location, "parser cache hit");
            return Ok(Rc::clone(hit));
        }

        let parsed = match kind {
            Kind::Binding => parse_binding(input, location),
            Kind::Interpolation => parse_interpolation(input, location),
        }?;
        debug!(
            input,
            location,
            pipes = parsed.pipe_slots(),
            ?kind,
            "parsed expression"
        );

        let parsed = Rc::new(parsed);
        self.cache.insert(key, Rc::clone(&parsed));
        Ok(parsed)
    }
}

/// Parses a single binding expression without caching.
pub fn parse_binding(input: &str, location: &str) -> Result<AstWithSource, ParseError> {
    let mut slots = 0;
    let ast = parse_segment(input, 0..input.len(), location, &mut slots)?;
    Ok(AstWithSource::new(ast, input, location, slots))
}

/// Parses interpolation text without caching.
pub fn parse_interpolation(input: &str, location: &str) -> Result<AstWithSource, ParseError> {
    let mut strings = Vec::new();
    let mut expressions = Vec::new();
    let mut slots = 0;
    let mut cursor = 0;

    while let Some(open) = input.get(cursor..).and_then(|rest| rest.find("{{")) {
        let open = cursor + open;
        let body = open + 2;
        let close = input
            .get(body..)
            .and_then(|rest| rest.find("}}"))
            .map(|close| body + close)
            .ok_or_else(|| ParseError::UnterminatedInterpolation {
                column: open,
                input: input.to_owned(),
                location: location.to_owned(),
            })?;

        strings.push(Rc::from(input.get(cursor..open).unwrap_or_default()));
        expressions.push(parse_segment(input, body..close, location, &mut slots)?);
        cursor = close + 2;
    }
    strings.push(Rc::from(input.get(cursor..).unwrap_or_default()));

    let ast = Ast::Interpolation {
        strings,
        expressions,
    };
    Ok(AstWithSource::new(ast, input, location, slots))
}

fn parse_segment(
    input: &str,
    segment: std::ops::Range<usize>,
    location: &str,
    slots: &mut usize,
) -> Result<Ast, ParseError> {
    let start = segment.start;
    let tokens = tokenize_segment(input, segment, location)?;
    if tokens.is_empty() {
        return Err(ParseError::EmptyExpression {
            column: start,
            input: input.to_owned(),
            location: location.to_owned(),
        });
    }

    let mut parser = ExprParser {
        tokens: &tokens,
        pos: 0,
        input,
        location,
        slots: *slots,
    };
    let ast = parser.parse_conditional()?;
    if parser.pos < tokens.len() {
        return Err(parser.unexpected("end of expression"));
    }
    *slots = parser.slots;
    Ok(ast)
}

struct ExprParser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    input: &'a str,
    location: &'a str,
    slots: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn advance(&mut self) -> Option<&'a Spanned> {
        let spanned = self.tokens.get(self.pos);
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, description: &str) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(description))
        }
    }

    fn expect_name(&mut self, description: &str) -> Result<Rc<str>, ParseError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(Rc::clone(name))
            }
            _ => Err(self.unexpected(description)),
        }
    }

    /// Error for the token at the cursor, or for the end of input.
    fn unexpected(&self, expected: &str) -> ParseError {
        match self.tokens.get(self.pos) {
            Some((token, span)) => self.unexpected_at(token, span.start, expected),
            None => ParseError::UnexpectedEnd {
                expected: expected.to_owned(),
                input: self.input.to_owned(),
                location: self.location.to_owned(),
            },
        }
    }

    fn unexpected_at(&self, token: &Token, column: usize, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            found: token.to_string(),
            expected: expected.to_owned(),
            column,
            input: self.input.to_owned(),
            location: self.location.to_owned(),
        }
    }

    fn parse_conditional(&mut self) -> Result<Ast, ParseError> {
        let condition = self.parse_or()?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let yes = self.parse_conditional()?;
        self.expect(&Token::Colon, "':' in conditional")?;
        let no = self.parse_conditional()?;
        Ok(Ast::Conditional {
            condition: Box::new(condition),
            yes: Box::new(yes),
            no: Box::new(no),
        })
    }

    /// Parses one left-associative binary level.
    fn parse_binary(
        &mut self,
        ops: &[(Token, BinaryOp)],
        next: fn(&mut Self) -> Result<Ast, ParseError>,
    ) -> Result<Ast, ParseError> {
        let mut left = next(self)?;
        'outer: loop {
            for (token, op) in ops {
                if self.eat(token) {
                    let right = next(self)?;
                    left = Ast::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn parse_or(&mut self) -> Result<Ast, ParseError> {
        self.parse_binary(&[(Token::Or, BinaryOp::Or)], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Ast, ParseError> {
        self.parse_binary(&[(Token::And, BinaryOp::And)], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Ast, ParseError> {
        self.parse_binary(
            &[
                (Token::Eq, BinaryOp::Eq),
                (Token::Ne, BinaryOp::Ne),
                (Token::StrictEq, BinaryOp::StrictEq),
                (Token::StrictNe, BinaryOp::StrictNe),
            ],
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> Result<Ast, ParseError> {
        self.parse_binary(
            &[
                (Token::Lt, BinaryOp::Lt),
                (Token::Gt, BinaryOp::Gt),
                (Token::Le, BinaryOp::Le),
                (Token::Ge, BinaryOp::Ge),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Ast, ParseError> {
        self.parse_binary(
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Ast, ParseError> {
        self.parse_binary(
            &[
                (Token::Star, BinaryOp::Mul),
                (Token::Slash, BinaryOp::Div),
                (Token::Percent, BinaryOp::Rem),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Ast, ParseError> {
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            _ => return self.parse_pipe(),
        };
        self.pos += 1;
        let operand = self.parse_unary()?;
        Ok(Ast::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_pipe(&mut self) -> Result<Ast, ParseError> {
        let mut exp = self.parse_postfix()?;
        while self.eat(&Token::Pipe) {
            let name = self.expect_name("a pipe name")?;
            let mut args = Vec::new();
            while self.eat(&Token::Colon) {
                args.push(self.parse_postfix()?);
            }
            let slot = self.slots;
            self.slots += 1;
            exp = Ast::Pipe {
                exp: Box::new(exp),
                name,
                args,
                slot,
            };
        }
        Ok(exp)
    }

    fn parse_postfix(&mut self) -> Result<Ast, ParseError> {
        let mut exp = self.parse_primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let name = self.expect_name("a member name")?;
                exp = if self.eat(&Token::LParen) {
                    Ast::MethodCall {
                        receiver: Box::new(exp),
                        name,
                        args: self.parse_call_args()?,
                    }
                } else {
                    Ast::PropertyRead {
                        receiver: Box::new(exp),
                        name,
                    }
                };
            } else if self.eat(&Token::LBracket) {
                let key = self.parse_conditional()?;
                self.expect(&Token::RBracket, "']'")?;
                exp = Ast::KeyedRead {
                    receiver: Box::new(exp),
                    key: Box::new(key),
                };
            } else if self.eat(&Token::LParen) {
                exp = Ast::FunctionCall {
                    target: Box::new(exp),
                    args: self.parse_call_args()?,
                };
            } else {
                return Ok(exp);
            }
        }
    }

    /// Parses arguments after an already consumed `(`.
    fn parse_call_args(&mut self) -> Result<Vec<Ast>, ParseError> {
        self.parse_sequence(&Token::RParen, "',' or ')'")
    }

    /// Parses a comma separated list of expressions up to `close`.
    fn parse_sequence(&mut self, close: &Token, description: &str) -> Result<Vec<Ast>, ParseError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_conditional()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(close, description)?;
            return Ok(items);
        }
    }

    fn parse_primary(&mut self) -> Result<Ast, ParseError> {
        let Some((token, span)) = self.advance() else {
            return Err(self.unexpected(EXPRESSION));
        };
        let ast = match token {
            Token::True => Ast::Literal(Value::Bool(true)),
            Token::False => Ast::Literal(Value::Bool(false)),
            Token::Null | Token::Undefined => Ast::Literal(Value::Null),
            Token::Int(i) => Ast::Literal(Value::Int(*i)),
            Token::Float(x) => Ast::Literal(Value::Float(*x)),
            Token::Str(s) => Ast::Literal(Value::Str(Rc::clone(s))),
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    Ast::MethodCall {
                        receiver: Box::new(Ast::ImplicitReceiver),
                        name: Rc::clone(name),
                        args: self.parse_call_args()?,
                    }
                } else {
                    Ast::name(Rc::clone(name))
                }
            }
            Token::LParen => {
                let inner = self.parse_conditional()?;
                self.expect(&Token::RParen, "')'")?;
                inner
            }
            Token::LBracket => Ast::LiteralArray(self.parse_sequence(&Token::RBracket, "',' or ']'")?),
            Token::LBrace => self.parse_map()?,
            other => return Err(self.unexpected_at(other, span.start, EXPRESSION)),
        };
        Ok(ast)
    }

    /// Parses map entries after an already consumed `{`.
    fn parse_map(&mut self) -> Result<Ast, ParseError> {
        let mut entries = Vec::new();
        if self.eat(&Token::RBrace) {
            return Ok(Ast::LiteralMap(entries));
        }
        loop {
            let key = match self.peek() {
                Some(Token::Ident(key) | Token::Str(key)) => Rc::clone(key),
                _ => return Err(self.unexpected("a map key")),
            };
            self.pos += 1;
            self.expect(&Token::Colon, "':' after map key")?;
            entries.push((key, self.parse_conditional()?));
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RBrace, "',' or '}'")?;
            return Ok(Ast::LiteralMap(entries));
        }
    }
}
