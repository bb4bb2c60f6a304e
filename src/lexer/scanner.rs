use super::token::{Token, TokenKind};
use crate::error::Error;

/// Scanner for Little Duck source text
///
/// Lexical errors do not stop the scan: the offending character is skipped,
/// the error is recorded and scanning resumes, so the parser still sees a
/// complete token stream ending in [`TokenKind::Eof`].
pub struct Scanner {
    /// Source code as character vector
    source: Vec<char>,
    /// Accumulated tokens
    tokens: Vec<Token>,
    /// Accumulated lexical errors
    errors: Vec<Error>,
    /// Start position of current token
    start: usize,
    /// Column where the current token starts
    start_column: usize,
    /// Current position in source
    current: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
}

impl Scanner {
    /// Creates a new scanner from source code
    pub fn new(source: &str) -> Self {
        Scanner {
            source: source.chars().collect(),
            tokens: Vec::new(),
            errors: Vec::new(),
            start: 0,
            start_column: 1,
            current: 0,
            line: 1,
            column: 1,
        }
    }

    /// Scans all tokens from source code and returns them as a vector
    pub fn scan_tokens(&mut self) -> Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_column = self.column;
            self.scan_token();
        }

        self.tokens.push(Token::new(
            TokenKind::Eof,
            String::new(),
            self.line,
            self.column,
        ));

        tracing::trace!(
            tokens = self.tokens.len(),
            errors = self.errors.len(),
            "scan complete"
        );
        std::mem::take(&mut self.tokens)
    }

    /// Lexical errors recorded so far
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Move the recorded lexical errors out of the scanner
    pub fn take_errors(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.errors)
    }

    fn scan_token(&mut self) {
        let c = self.advance();

        match c {
            ' ' | '\r' | '\t' => {}
            '\n' => self.newline(),

            // Comments
            '#' => self.skip_line_comment(),
            '/' if self.match_char('/') => self.skip_line_comment(),
            '/' if self.match_char('*') => self.skip_block_comment(),

            // Delimiters
            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '{' => self.add_token(TokenKind::LeftBrace),
            '}' => self.add_token(TokenKind::RightBrace),
            '[' => self.add_token(TokenKind::LeftBracket),
            ']' => self.add_token(TokenKind::RightBracket),
            ',' => self.add_token(TokenKind::Comma),
            ';' => self.add_token(TokenKind::Semicolon),
            ':' => self.add_token(TokenKind::Colon),

            // Operators
            '+' => self.add_token(TokenKind::Plus),
            '-' => self.add_token(TokenKind::Minus),
            '*' => self.add_token(TokenKind::Star),
            '/' => self.add_token(TokenKind::Slash),
            '=' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::Eq);
                } else {
                    self.add_token(TokenKind::Assign);
                }
            }
            '!' if self.match_char('=') => self.add_token(TokenKind::NotEq),
            '<' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::LtEq);
                } else {
                    self.add_token(TokenKind::Lt);
                }
            }
            '>' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::GtEq);
                } else {
                    self.add_token(TokenKind::Gt);
                }
            }

            '"' => self.scan_string(),

            c if c.is_ascii_digit() => self.scan_number(),

            c if c.is_ascii_alphabetic() || c == '_' => self.scan_identifier_or_keyword(),

            _ => self.illegal(c),
        }
    }

    fn illegal(&mut self, character: char) {
        tracing::warn!(line = self.line, col = self.start_column, %character, "illegal character");
        self.errors.push(Error::LexicalError {
            line: self.line,
            col: self.start_column,
            character,
        });
    }

    fn newline(&mut self) {
        self.line += 1;
        self.column = 1;
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        while !self.is_at_end() {
            if self.peek() == '*' && self.peek_next() == '/' {
                self.advance();
                self.advance();
                return;
            }
            if self.advance() == '\n' {
                self.newline();
            }
        }
    }

    fn scan_string(&mut self) {
        let mut value = String::new();

        while !self.is_at_end() && self.peek() != '"' && self.peek() != '\n' {
            if self.peek() == '\\' {
                self.advance();
                if self.is_at_end() || self.peek() == '\n' {
                    break;
                }
                match self.advance() {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
            } else {
                value.push(self.advance());
            }
        }

        if self.is_at_end() || self.peek() == '\n' {
            tracing::warn!(line = self.line, col = self.start_column, "unterminated string");
            self.errors.push(Error::UnterminatedString {
                line: self.line,
                col: self.start_column,
            });
            return;
        }

        self.advance(); // Closing "

        self.add_token(TokenKind::String(value));
    }

    fn scan_number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let mut is_float = false;
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            is_float = true;
            self.advance(); // consume .
            while self.peek().is_ascii_digit() {
                self.advance();
            }

            let exponent_digit = match self.peek_next() {
                '+' | '-' => self.peek_at(2).is_ascii_digit(),
                c => c.is_ascii_digit(),
            };
            if matches!(self.peek(), 'e' | 'E') && exponent_digit {
                self.advance(); // consume e
                if matches!(self.peek(), '+' | '-') {
                    self.advance();
                }
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
        }

        let text: String = self.source[self.start..self.current].iter().collect();

        if is_float {
            match text.parse::<f64>() {
                Ok(value) => self.add_token(TokenKind::Float(value)),
                Err(_) => self.illegal(self.source[self.start]),
            }
        } else {
            match text.parse::<i64>() {
                Ok(value) => self.add_token(TokenKind::Integer(value)),
                // Out of range for i64
                Err(_) => self.illegal(self.source[self.start]),
            }
        }
    }

    fn scan_identifier_or_keyword(&mut self) {
        while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Identifier(text));
        self.add_token(kind);
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        self.column += 1;
        c
    }

    fn peek(&self) -> char {
        self.peek_at(0)
    }

    fn peek_next(&self) -> char {
        self.peek_at(1)
    }

    fn peek_at(&self, offset: usize) -> char {
        self.source
            .get(self.current + offset)
            .copied()
            .unwrap_or('\0')
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            false
        } else {
            self.current += 1;
            self.column += 1;
            true
        }
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        self.tokens
            .push(Token::new(kind, lexeme, self.line, self.start_column));
    }
}
