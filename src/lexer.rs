//! Lexer for the Prolog subset.
//!
//! Tokenizes programs and queries into atoms, variables, `[]`, `:-` and
//! punctuation, skipping whitespace, `%` line comments and unnested
//! `/* ... */` block comments.
//!
//! Graphic atoms may not begin with `.`, `/` or `:`, which keeps the lexer
//! at a single character of lookahead: those characters start the period,
//! a block comment and `:-` respectively.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::RecognitionError;
use crate::token::Token;

/// Lexer for Prolog source text.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
        }
    }

    /// The line number currently being processed.
    pub fn line(&self) -> usize {
        self.line
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn consume(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    /// Consumes the lookahead if it matches `expected`, and errs otherwise.
    fn match_char(&mut self, expected: char) -> Result<(), RecognitionError> {
        if self.peek() == Some(expected) {
            self.consume();
            Ok(())
        } else {
            Err(RecognitionError::from_char(
                self.peek(),
                self.line,
                &[&expected.to_string()],
            ))
        }
    }

    /// Returns the next token from the input.
    pub fn next_token(&mut self) -> Result<Token, RecognitionError> {
        loop {
            let c = match self.peek() {
                Some(c) => c,
                None => return Ok(Token::Eof),
            };
            if is_whitespace(c) {
                self.consume();
                continue;
            }
            if c.is_ascii_alphabetic() || c == '_' {
                return Ok(self.identifier());
            }
            match c {
                '%' => self.line_comment(),
                '/' => self.block_comment()?,
                '#' | '$' | '&' | '*' | '+' | '-' | '<' | '=' | '>' | '?' | '@' | '^' | '~'
                | '\\' => return Ok(self.graphic()),
                '(' => {
                    self.consume();
                    return Ok(Token::LBrack);
                }
                ')' => {
                    self.consume();
                    return Ok(Token::RBrack);
                }
                ',' => {
                    self.consume();
                    return Ok(Token::Comma);
                }
                '.' => {
                    self.consume();
                    return Ok(Token::Period);
                }
                ':' => {
                    self.consume();
                    self.match_char('-')?;
                    return Ok(Token::Implies);
                }
                '[' => {
                    self.consume();
                    self.match_char(']')?;
                    return Ok(Token::Nil);
                }
                _ => {
                    return Err(RecognitionError::from_char(Some(c), self.line, &[]));
                }
            }
        }
    }

    // id = {"_" | small | capital | digit}- ; an atom when the first
    // character is a small letter, a variable otherwise. Identifiers may
    // not begin with a digit.
    fn identifier(&mut self) -> Token {
        let small = matches!(self.peek(), Some(c) if c.is_ascii_lowercase());
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.consume();
            } else {
                break;
            }
        }
        if small {
            Token::Atom(text)
        } else {
            Token::Var(text)
        }
    }

    // graphic = "#" | "$" | "&" | "*" | "+" | "-" | "." | "/" | ":" | "<"
    //         | "=" | ">" | "?" | "@" | "^" | "~" | "\" ;
    fn graphic(&mut self) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if is_graphic(c) {
                text.push(c);
                self.consume();
            } else {
                break;
            }
        }
        Token::Atom(text)
    }

    // "%" to end of line.
    fn line_comment(&mut self) {
        while let Some(c) = self.consume() {
            if c == '\n' {
                break;
            }
        }
    }

    // "/*" to the first "*/"; block comments do not nest.
    fn block_comment(&mut self) -> Result<(), RecognitionError> {
        self.consume();
        self.match_char('*')?;
        loop {
            match self.consume() {
                Some('*') => {
                    if self.peek() == Some('/') {
                        self.consume();
                        return Ok(());
                    }
                }
                Some(_) => {}
                None => {
                    return Err(RecognitionError::from_char(None, self.line, &["*"]));
                }
            }
        }
    }
}

fn is_whitespace(c: char) -> bool {
    c == '\t' || c == '\n' || c == '\r' || c == ' '
}

fn is_graphic(c: char) -> bool {
    matches!(
        c,
        '#' | '$'
            | '&'
            | '*'
            | '+'
            | '-'
            | '.'
            | '/'
            | ':'
            | '<'
            | '='
            | '>'
            | '?'
            | '@'
            | '^'
            | '~'
            | '\\'
    )
}
