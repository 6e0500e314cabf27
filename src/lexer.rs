use crate::error::LexError;
use crate::token::{Span, Spanned, Token};

/// Tokenizer for stroke offset expressions such as `3/4`, `bar - 1/2`
/// or `2 * (beat + 0.5)`.
pub struct Lexer {
    chars: Vec<char>,
    /// `byte_offsets[i]` = byte offset of `chars[i]` in the original `&str`.
    /// `byte_offsets[chars.len()]` = total byte length (sentinel for EOF).
    byte_offsets: Vec<usize>,
    pos: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let mut byte_offsets = Vec::with_capacity(chars.len() + 1);
        let mut offset = 0;
        for ch in &chars {
            byte_offsets.push(offset);
            offset += ch.len_utf8();
        }
        byte_offsets.push(offset);
        Lexer {
            chars,
            byte_offsets,
            pos: 0,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_token()?;
            let is_eof = spanned.token == Token::EOF;
            tokens.push(spanned);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn byte_pos_of(&self, char_idx: usize) -> usize {
        self.byte_offsets[char_idx.min(self.chars.len())]
    }

    fn spanned(&self, token: Token, start: usize) -> Spanned {
        Spanned {
            token,
            span: Span {
                start: self.byte_pos_of(start),
                end: self.byte_pos_of(self.pos),
            },
        }
    }

    fn single(&mut self, token: Token, start: usize) -> Result<Spanned, LexError> {
        self.pos += 1;
        Ok(self.spanned(token, start))
    }

    fn next_token(&mut self) -> Result<Spanned, LexError> {
        self.skip_whitespace();

        let start = self.pos;
        let Some(ch) = self.peek_at(0) else {
            return Ok(self.spanned(Token::EOF, start));
        };

        match ch {
            '+' => self.single(Token::Plus, start),
            '-' => self.single(Token::Minus, start),
            '*' => self.single(Token::Star, start),
            '/' => self.single(Token::Slash, start),
            '(' => self.single(Token::LParen, start),
            ')' => self.single(Token::RParen, start),
            c if c.is_ascii_digit() => self.lex_number(start),
            '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.lex_number(start),
            c if c.is_ascii_alphabetic() || c == '_' => self.lex_ident(start),
            _ => Err(LexError::UnexpectedChar {
                ch,
                pos: self.byte_pos_of(start),
            }),
        }
    }

    fn lex_number(&mut self, start: usize) -> Result<Spanned, LexError> {
        while self
            .peek_at(0)
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '.')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.parse::<f64>() {
            Ok(num) if num.is_finite() => Ok(self.spanned(Token::Number(num), start)),
            _ => Err(LexError::InvalidNumber {
                text,
                pos: self.byte_pos_of(start),
            }),
        }
    }

    fn lex_ident(&mut self, start: usize) -> Result<Spanned, LexError> {
        while let Some(ch) = self.peek_at(0) {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        Ok(self.spanned(Token::Ident(text), start))
    }
}
