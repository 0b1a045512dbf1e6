//! Lexer for surface type expressions.
//!
//! Converts a query string like `('a -> 'b) -> 'a list -> 'b list` into a
//! stream of tokens. The lexer implements `Iterator<Item = Token>` so the
//! parser can consume tokens lazily or collect them into a `Vec`.

use crate::span::Span;
use crate::token::{Token, TokenKind};

/// Byte-level source iterator with position tracking.
struct Cursor<'src> {
    pos: u32,
    chars: std::str::Chars<'src>,
}

impl<'src> Cursor<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            pos: 0,
            chars: source.chars(),
        }
    }

    /// Look at the current character without consuming it.
    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    /// Consume the current character and advance the position.
    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8() as u32;
        Some(c)
    }

    /// Current byte position in the source text.
    fn pos(&self) -> u32 {
        self.pos
    }

    /// Advance while the predicate holds for the current character.
    fn eat_while(&mut self, predicate: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if predicate(c) {
                self.advance();
            } else {
                break;
            }
        }
    }
}

/// The type-expression lexer.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    /// Whether we have already emitted the `Eof` token.
    emitted_eof: bool,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source text.
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            emitted_eof: false,
        }
    }

    /// Convenience: tokenize the entire source into a `Vec<Token>`.
    ///
    /// The returned vector includes the final `Eof` token.
    pub fn tokenize(source: &str) -> Vec<Token> {
        Lexer::new(source).collect()
    }

    fn produce_token(&mut self) -> Token {
        self.cursor.eat_while(|c| c.is_whitespace());

        let start = self.cursor.pos();

        let Some(c) = self.cursor.peek() else {
            return Token::new(TokenKind::Eof, start, start);
        };

        match c {
            '(' => self.single_char_token(TokenKind::LParen, start),
            ')' => self.single_char_token(TokenKind::RParen, start),
            ',' => self.single_char_token(TokenKind::Comma, start),
            '.' => self.single_char_token(TokenKind::Dot, start),
            '*' => self.single_char_token(TokenKind::Star, start),

            '-' => {
                self.cursor.advance();
                if self.cursor.peek() == Some('>') {
                    self.cursor.advance();
                    Token::new(TokenKind::Arrow, start, self.cursor.pos())
                } else {
                    Token::new(TokenKind::Error, start, self.cursor.pos())
                }
            }

            '\'' => {
                self.cursor.advance();
                self.cursor.eat_while(is_ident_continue);
                let end = self.cursor.pos();
                // A lone quote with no name is an error token.
                if end - start == 1 {
                    Token::new(TokenKind::Error, start, end)
                } else {
                    Token::new(TokenKind::QuoteIdent, start, end)
                }
            }

            '<' => self.lex_opaque(start),

            '_' => {
                self.cursor.advance();
                // `_foo` is an identifier; a bare `_` is the wildcard.
                if self.cursor.peek().map_or(false, is_ident_continue) {
                    self.cursor.eat_while(is_ident_continue);
                    Token::new(TokenKind::Ident, start, self.cursor.pos())
                } else {
                    Token::new(TokenKind::Underscore, start, self.cursor.pos())
                }
            }

            c if is_ident_start(c) => {
                self.cursor.eat_while(is_ident_continue);
                Token::new(TokenKind::Ident, start, self.cursor.pos())
            }

            _ => {
                self.cursor.advance();
                Token::new(TokenKind::Error, start, self.cursor.pos())
            }
        }
    }

    /// Lex an opaque `< ... >` blob, tracking bracket depth so nested angle
    /// brackets stay inside one token. An unclosed blob becomes an error
    /// token covering the rest of the input.
    fn lex_opaque(&mut self, start: u32) -> Token {
        self.cursor.advance();
        let mut depth = 1u32;
        while let Some(c) = self.cursor.advance() {
            match c {
                '<' => depth += 1,
                '>' => {
                    depth -= 1;
                    if depth == 0 {
                        return Token::new(TokenKind::Opaque, start, self.cursor.pos());
                    }
                }
                _ => {}
            }
        }
        Token::new(TokenKind::Error, start, self.cursor.pos())
    }

    fn single_char_token(&mut self, kind: TokenKind, start: u32) -> Token {
        self.cursor.advance();
        Token::new(kind, start, self.cursor.pos())
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.emitted_eof {
            return None;
        }
        let token = self.produce_token();
        if token.kind == TokenKind::Eof {
            self.emitted_eof = true;
        }
        Some(token)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\''
}

/// Slice the text of a token out of the source.
pub fn token_text<'src>(source: &'src str, span: Span) -> &'src str {
    &source[span.start as usize..span.end as usize]
}
