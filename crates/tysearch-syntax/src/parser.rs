//! Recursive-descent parser for surface type expressions.
//!
//! Precedence, loosest to tightest: arrow (right-associative), tuple (`*`),
//! postfix constructor application (`'a list`, `('a, 'b) result`). The
//! parser fails fast on the first error; query strings are single short
//! expressions, so recovery buys nothing.

use crate::ast::TypeExpr;
use crate::error::ParseError;
use crate::lexer::{token_text, Lexer};
use crate::span::Span;
use crate::token::{Token, TokenKind};

/// Parse a complete type expression from source text.
///
/// The whole input must be consumed; trailing tokens are an error.
pub fn parse_type(source: &str) -> Result<TypeExpr, ParseError> {
    let tokens = Lexer::tokenize(source);
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let ty = parser.parse_arrow()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(ParseError::new(
            format!("unexpected `{}` after type", token_text(source, trailing.span)),
            trailing.span,
        ));
    }
    Ok(ty)
}

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
}

/// What an atom parse produced: a complete expression, or a parenthesized
/// argument list that must be followed by a constructor name.
enum Prefix {
    Single(TypeExpr),
    ArgList(Vec<TypeExpr>, Span),
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Token {
        self.tokens[self.pos]
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            let tok = self.peek();
            Err(ParseError::new(
                format!("expected {what}, found `{}`", self.describe(tok)),
                tok.span,
            ))
        }
    }

    fn describe(&self, tok: Token) -> String {
        match tok.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => token_text(self.source, tok.span).to_string(),
        }
    }

    fn text(&self, span: Span) -> &'src str {
        token_text(self.source, span)
    }

    // ── Grammar ────────────────────────────────────────────────────────

    /// arrow := tuple ("->" arrow)?
    fn parse_arrow(&mut self) -> Result<TypeExpr, ParseError> {
        let lhs = self.parse_tuple()?;
        if self.at(TokenKind::Arrow) {
            self.bump();
            let rhs = self.parse_arrow()?;
            let span = lhs.span().merge(rhs.span());
            Ok(TypeExpr::Arrow {
                arg: Box::new(lhs),
                ret: Box::new(rhs),
                span,
            })
        } else {
            Ok(lhs)
        }
    }

    /// tuple := app ("*" app)*
    fn parse_tuple(&mut self) -> Result<TypeExpr, ParseError> {
        let first = self.parse_app()?;
        if !self.at(TokenKind::Star) {
            return Ok(first);
        }
        let mut span = first.span();
        let mut elts = vec![first];
        while self.at(TokenKind::Star) {
            self.bump();
            let next = self.parse_app()?;
            span = span.merge(next.span());
            elts.push(next);
        }
        Ok(TypeExpr::Tuple { elts, span })
    }

    /// app := atom path*
    ///
    /// Postfix constructor application: `int list` applies `list` to `int`,
    /// `('a, 'b) result` applies `result` to two arguments, and chains
    /// left-associatively (`int list option`).
    fn parse_app(&mut self) -> Result<TypeExpr, ParseError> {
        let mut prefix = self.parse_atom()?;
        loop {
            if !self.at(TokenKind::Ident) {
                break;
            }
            let (name, name_span) = self.parse_path()?;
            let (args, args_span) = match prefix {
                Prefix::Single(expr) => {
                    let span = expr.span();
                    (vec![expr], span)
                }
                Prefix::ArgList(args, span) => (args, span),
            };
            prefix = Prefix::Single(TypeExpr::Constr {
                name,
                args,
                span: args_span.merge(name_span),
            });
        }
        match prefix {
            Prefix::Single(expr) => Ok(expr),
            Prefix::ArgList(_, span) => Err(ParseError::new(
                "expected a constructor after argument list",
                span,
            )),
        }
    }

    /// atom := path | 'var | "_" | opaque | "(" ")" | "(" type ("," type)* ")"
    fn parse_atom(&mut self) -> Result<Prefix, ParseError> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Ident => {
                let (name, span) = self.parse_path()?;
                Ok(Prefix::Single(TypeExpr::Constr {
                    name,
                    args: Vec::new(),
                    span,
                }))
            }
            TokenKind::QuoteIdent => {
                self.bump();
                Ok(Prefix::Single(TypeExpr::Var {
                    name: self.text(tok.span)[1..].to_string(),
                    span: tok.span,
                }))
            }
            TokenKind::Underscore => {
                self.bump();
                Ok(Prefix::Single(TypeExpr::Wildcard { span: tok.span }))
            }
            TokenKind::Opaque => {
                self.bump();
                Ok(Prefix::Single(TypeExpr::Opaque {
                    raw: self.text(tok.span).to_string(),
                    span: tok.span,
                }))
            }
            TokenKind::LParen => {
                let open = self.bump();
                if self.at(TokenKind::RParen) {
                    let close = self.bump();
                    // `()` is the unit constructor.
                    return Ok(Prefix::Single(TypeExpr::Constr {
                        name: vec!["unit".to_string()],
                        args: Vec::new(),
                        span: open.span.merge(close.span),
                    }));
                }
                let mut elts = vec![self.parse_arrow()?];
                while self.at(TokenKind::Comma) {
                    self.bump();
                    elts.push(self.parse_arrow()?);
                }
                let close = self.expect(TokenKind::RParen, "`)`")?;
                let span = open.span.merge(close.span);
                if elts.len() == 1 {
                    Ok(Prefix::Single(elts.pop().expect("one element")))
                } else {
                    Ok(Prefix::ArgList(elts, span))
                }
            }
            TokenKind::Error => Err(ParseError::new(
                format!("unrecognized input `{}`", self.describe(tok)),
                tok.span,
            )),
            _ => Err(ParseError::new(
                format!("expected a type, found `{}`", self.describe(tok)),
                tok.span,
            )),
        }
    }

    /// path := Ident ("." Ident)*
    fn parse_path(&mut self) -> Result<(Vec<String>, Span), ParseError> {
        let first = self.expect(TokenKind::Ident, "an identifier")?;
        let mut span = first.span;
        let mut segments = vec![self.text(first.span).to_string()];
        while self.at(TokenKind::Dot) {
            self.bump();
            let seg = self.expect(TokenKind::Ident, "an identifier after `.`")?;
            segments.push(self.text(seg.span).to_string());
            span = span.merge(seg.span);
        }
        Ok((segments, span))
    }
}
