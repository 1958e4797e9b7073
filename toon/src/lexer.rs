//! The indentation-aware tokenizer. See `spec.md` §4.1.
//!
//! A single physical newline can resolve to `Newline` followed by zero or
//! more `Dedent`s, or `Newline` followed by one `Indent`/`SameIndent` — more
//! tokens than one call to `next_token` can return. The lexer buffers the
//! extra tokens in a small FIFO queue (`pending`) and drains it before
//! scanning further input, which keeps `next_token` a pure pull interface.

use std::collections::VecDeque;
use std::str::Chars;

use crate::config::Options;
use crate::error::ErrorKind;
use crate::token::{Delimiter, Number, Token, TokenKind};

const BREAKING_CHARS: &[char] = &[':', ',', '|', '[', ']', '{', '}', '"'];

pub struct Lexer<'a> {
    chars: Chars<'a>,
    current: Option<char>,
    peek: Option<char>,
    line: u32,
    column: u32,
    indent_stack: Vec<u32>,
    pending: VecDeque<Token>,
    options: Options,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, options: Options) -> Self {
        let mut chars = input.chars();
        let current = chars.next();
        let peek = chars.next();
        Lexer {
            chars,
            current,
            peek,
            line: 1,
            column: 0,
            indent_stack: vec![0],
            pending: VecDeque::new(),
            options,
        }
    }

    /// The indent level (in spaces) the lexer currently sits at.
    pub fn indent_level(&self) -> u32 {
        *self.indent_stack.last().unwrap_or(&0)
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    fn advance(&mut self) -> Option<char> {
        let consumed = self.current;
        match consumed {
            Some('\n') => {
                self.line += 1;
                self.column = 0;
            }
            Some(_) => self.column += 1,
            None => {}
        }
        self.current = self.peek;
        self.peek = self.chars.next();
        consumed
    }

    /// Pull the next token, draining the pending queue first.
    pub fn next_token(&mut self) -> Token {
        if let Some(tok) = self.pending.pop_front() {
            return tok;
        }
        self.scan()
    }

    fn queue(&mut self, mut tokens: VecDeque<Token>) -> Token {
        let first = tokens
            .pop_front()
            .expect("a queued batch always has at least one token");
        self.pending.extend(tokens);
        first
    }

    fn error(&self, kind: ErrorKind, message: impl Into<String>, line: u32, column: u32) -> Token {
        Token::new(TokenKind::Error(kind, message.into()), line, column)
    }

    fn scan(&mut self) -> Token {
        if self.column > 0 {
            while self.current == Some(' ') {
                self.advance();
            }
        }

        let start_line = self.line;
        let start_col = self.column;

        match self.current {
            None => self.scan_eof(),
            Some('\n') => self.scan_newline(),
            Some(':') => {
                self.advance();
                Token::new(TokenKind::Colon, start_line, start_col)
            }
            Some(',') => {
                self.advance();
                Token::new(TokenKind::Comma, start_line, start_col)
            }
            Some('|') => {
                self.advance();
                Token::new(TokenKind::Pipe, start_line, start_col)
            }
            Some('[') => {
                self.advance();
                Token::new(TokenKind::LBracket, start_line, start_col)
            }
            Some(']') => {
                self.advance();
                Token::new(TokenKind::RBracket, start_line, start_col)
            }
            Some('{') => {
                self.advance();
                Token::new(TokenKind::LBrace, start_line, start_col)
            }
            Some('}') => {
                self.advance();
                Token::new(TokenKind::RBrace, start_line, start_col)
            }
            Some('\t') => {
                self.advance();
                Token::new(TokenKind::Htab, start_line, start_col)
            }
            Some('-') if self.peek == Some(' ') => {
                self.advance();
                Token::new(TokenKind::Hyphen, start_line, start_col)
            }
            Some('-') if matches!(self.peek, Some(c) if c.is_ascii_digit()) => {
                self.scan_number(start_line, start_col)
            }
            Some('-') => self.scan_bare(start_line, start_col),
            Some('"') => self.scan_quoted_string(start_line, start_col),
            Some(c) if c.is_ascii_digit() => self.scan_number(start_line, start_col),
            Some(c) if c.is_alphabetic() || c == '_' => self.scan_identifier(start_line, start_col),
            Some(_) => self.scan_bare(start_line, start_col),
        }
    }

    fn scan_eof(&mut self) -> Token {
        if self.indent_stack.len() > 1 {
            let mut batch = VecDeque::new();
            while self.indent_stack.len() > 1 {
                self.indent_stack.pop();
                batch.push_back(Token::new(TokenKind::Dedent, self.line, self.column));
            }
            batch.push_back(Token::new(TokenKind::Eof, self.line, self.column));
            return self.queue(batch);
        }
        Token::new(TokenKind::Eof, self.line, self.column)
    }

    fn scan_newline(&mut self) -> Token {
        let newline_line = self.line;
        let newline_col = self.column;
        self.advance(); // consume '\n'

        let mut batch = VecDeque::new();
        batch.push_back(Token::new(TokenKind::Newline, newline_line, newline_col));

        // Count the run of leading spaces on the new line.
        let mut spaces: u32 = 0;
        while self.current == Some(' ') {
            spaces += 1;
            self.advance();
        }

        // A literal tab in leading whitespace is reserved for the delimiter
        // only; it is never a valid indentation character.
        if self.current == Some('\t') {
            batch.push_back(self.error(
                ErrorKind::Indentation,
                format!("tab character in indentation at line {}", self.line),
                self.line,
                self.column,
            ));
            return self.queue(batch);
        }

        // Blank line (only whitespace before EOF or the next newline): layout
        // noise, the indent stack is left untouched.
        if self.current.is_none() || self.current == Some('\n') {
            return self.queue(batch);
        }

        if self.options.strict_mode && spaces % self.options.indent_size != 0 {
            batch.push_back(self.error(
                ErrorKind::Indentation,
                format!(
                    "invalid indentation at line {}: {} spaces is not a multiple of {}",
                    self.line, spaces, self.options.indent_size
                ),
                self.line,
                0,
            ));
            return self.queue(batch);
        }

        let top = *self.indent_stack.last().unwrap_or(&0);
        if spaces > top {
            self.indent_stack.push(spaces);
            if self.indent_stack.len() as u32 > self.options.max_nesting_depth {
                batch.push_back(self.error(
                    ErrorKind::Resource,
                    "nesting depth exceeded",
                    self.line,
                    0,
                ));
                return self.queue(batch);
            }
            batch.push_back(Token::new(TokenKind::Indent, self.line, 0));
        } else if spaces < top {
            while *self.indent_stack.last().unwrap_or(&0) > spaces {
                self.indent_stack.pop();
                batch.push_back(Token::new(TokenKind::Dedent, self.line, 0));
            }
            let new_top = *self.indent_stack.last().unwrap_or(&0);
            if new_top != spaces {
                if self.options.strict_mode {
                    batch.push_back(self.error(
                        ErrorKind::Indentation,
                        format!(
                            "misaligned dedent at line {}: {} spaces matches no enclosing indent level",
                            self.line, spaces
                        ),
                        self.line,
                        0,
                    ));
                } else {
                    log::warn!(
                        "lenient recovery: adopting unseen indent level {} at line {}",
                        spaces,
                        self.line
                    );
                    self.indent_stack.push(spaces);
                }
            }
        } else {
            batch.push_back(Token::new(TokenKind::SameIndent, self.line, 0));
        }

        self.queue(batch)
    }

    fn scan_quoted_string(&mut self, start_line: u32, start_col: u32) -> Token {
        self.advance(); // consume opening quote
        let mut text = String::new();
        loop {
            match self.current {
                None | Some('\n') => {
                    return self.error(ErrorKind::Lexical, "unterminated string", start_line, start_col);
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.current {
                        Some('\\') => {
                            text.push('\\');
                            self.advance();
                        }
                        Some('"') => {
                            text.push('"');
                            self.advance();
                        }
                        Some('n') => {
                            text.push('\n');
                            self.advance();
                        }
                        Some('r') => {
                            text.push('\r');
                            self.advance();
                        }
                        Some('t') => {
                            text.push('\t');
                            self.advance();
                        }
                        Some(other) => {
                            if self.options.strict_mode {
                                return self.error(
                                    ErrorKind::Lexical,
                                    format!("invalid escape sequence '\\{}'", other),
                                    self.line,
                                    self.column,
                                );
                            }
                            log::warn!("lenient recovery: keeping invalid escape '\\{}' literally", other);
                            text.push(other);
                            self.advance();
                        }
                        None => {
                            return self.error(ErrorKind::Lexical, "unterminated string", start_line, start_col);
                        }
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
        Token::new(TokenKind::QuotedString(text), start_line, start_col)
    }

    fn scan_number(&mut self, start_line: u32, start_col: u32) -> Token {
        let mut text = String::new();
        if self.current == Some('-') {
            text.push('-');
            self.advance();
        }

        let int_start = text.len();
        while matches!(self.current, Some(c) if c.is_ascii_digit()) {
            text.push(self.current.unwrap());
            self.advance();
        }
        let int_part = &text[int_start..];
        let leading_zero_anomaly = int_part.len() > 1 && int_part.starts_with('0');

        let mut is_fractional = false;
        if self.current == Some('.') && matches!(self.peek, Some(c) if c.is_ascii_digit()) {
            is_fractional = true;
            text.push('.');
            self.advance();
            while matches!(self.current, Some(c) if c.is_ascii_digit()) {
                text.push(self.current.unwrap());
                self.advance();
            }
        }

        if matches!(self.current, Some('e') | Some('E')) {
            let mut lookahead_len = 1;
            let mut saw_digit = false;
            if matches!(self.peek, Some('+') | Some('-')) {
                lookahead_len += 1;
            }
            // We can't peek arbitrarily far with only a 1-char lookahead, so
            // speculatively consume and roll back if the exponent turns out
            // to be malformed.
            let checkpoint = (self.chars.clone(), self.current, self.peek, self.line, self.column);
            let mut exp_text = String::new();
            exp_text.push(self.current.unwrap());
            self.advance();
            if matches!(self.current, Some('+') | Some('-')) {
                exp_text.push(self.current.unwrap());
                self.advance();
            }
            while matches!(self.current, Some(c) if c.is_ascii_digit()) {
                saw_digit = true;
                exp_text.push(self.current.unwrap());
                self.advance();
            }
            if saw_digit {
                is_fractional = true;
                text.push_str(&exp_text);
            } else {
                let _ = lookahead_len;
                (self.chars, self.current, self.peek, self.line, self.column) = checkpoint;
            }
        }

        if text.len() as u32 > self.options.max_number_length {
            return self.error(
                ErrorKind::Resource,
                format!(
                    "numeric literal exceeds maximum length of {} characters",
                    self.options.max_number_length
                ),
                start_line,
                start_col,
            );
        }

        if leading_zero_anomaly {
            return Token::new(TokenKind::Identifier(text), start_line, start_col);
        }

        let number = if is_fractional {
            match text.parse::<f64>() {
                Ok(v) => Number::Fractional(v),
                Err(_) => return self.error(ErrorKind::Lexical, "invalid number literal", start_line, start_col),
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => Number::Integral(v),
                Err(_) => return self.error(ErrorKind::Lexical, "integer literal out of range", start_line, start_col),
            }
        };

        Token::new(TokenKind::Number(number), start_line, start_col)
    }

    fn scan_identifier(&mut self, start_line: u32, start_col: u32) -> Token {
        let mut text = String::new();
        while matches!(self.current, Some(c) if c.is_alphanumeric() || c == '_' || c == '.') {
            text.push(self.current.unwrap());
            self.advance();
        }
        Token::new(Self::classify_word(text), start_line, start_col)
    }

    fn scan_bare(&mut self, start_line: u32, start_col: u32) -> Token {
        let mut text = String::new();
        while let Some(c) = self.current {
            if c == '\n' || c == ' ' || c == '\t' || BREAKING_CHARS.contains(&c) {
                break;
            }
            text.push(c);
            self.advance();
        }
        if text.is_empty() {
            let c = self.current.unwrap();
            self.advance();
            return self.error(
                ErrorKind::Lexical,
                format!("unexpected character '{}'", c),
                start_line,
                start_col,
            );
        }
        Token::new(Self::classify_word(text), start_line, start_col)
    }

    fn classify_word(text: String) -> TokenKind {
        match text.as_str() {
            "true" => TokenKind::Boolean(true),
            "false" => TokenKind::Boolean(false),
            "null" => TokenKind::Null,
            _ => TokenKind::Identifier(text),
        }
    }
}
