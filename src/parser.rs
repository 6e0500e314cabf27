use crate::ast::*;
use crate::error::ParseError;
use crate::token::{Span, Spanned, Token};

/// Deepest nesting of parentheses and unary signs.
const MAX_DEPTH: usize = 64;
/// Most tokens an expression may hold, `EOF` included.
const MAX_TOKENS: usize = 256;

/// Recursive-descent parser for time expressions.
///
/// ```text
/// expr    := term (('+' | '-') term)*
/// term    := unary (('*' | '/') unary)*
/// unary   := ('-' | '+') unary | primary
/// primary := NUMBER | IDENT | '(' expr ')'
/// ```
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// `tokens` must end with `Token::EOF`, as produced by the lexer.
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    // ── Helpers ──────────────────────────────────────────────

    fn peek(&self) -> Token {
        self.tokens
            .get(self.pos)
            .map_or(Token::EOF, |s| s.token.clone())
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(Span { start: 0, end: 0 }, |s| s.span)
    }

    fn advance(&mut self) -> Spanned {
        let s = self.tokens[self.pos].clone();
        self.pos += 1;
        s
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Token::EOF => ParseError::UnexpectedEOF {
                expected: expected.into(),
                pos: self.span().start,
            },
            found => ParseError::UnexpectedToken {
                expected: expected.into(),
                found,
                span: self.span(),
            },
        }
    }

    // ── Entry ────────────────────────────────────────────────

    /// Parse a whole expression; trailing tokens are an error.
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        if let Some(extra) = self.tokens.get(MAX_TOKENS) {
            return Err(ParseError::TooLong { span: extra.span });
        }
        let expr = self.parse_sum()?;
        if self.peek() != Token::EOF {
            return Err(self.unexpected("operator"));
        }
        Ok(expr)
    }

    // ── Grammar ──────────────────────────────────────────────

    fn parse_sum(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_product()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            let span = self.advance().span;
            let rhs = self.parse_product()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_product(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            let span = self.advance().span;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep { span: self.span() });
        }
        self.depth += 1;
        let result = self.parse_signed();
        self.depth -= 1;
        result
    }

    fn parse_signed(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Token::Plus => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Token::Ident(name) => {
                let span = self.advance().span;
                Ok(Expr::Variable { name, span })
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_sum()?;
                match self.peek() {
                    Token::RParen => {
                        self.advance();
                        Ok(inner)
                    }
                    _ => Err(self.unexpected("')'")),
                }
            }
            _ => Err(self.unexpected("number, name or '('")),
        }
    }
}
