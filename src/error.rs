//! Compilation error types.
//!
//! Recognition errors cover tokenization and parsing; `CompileError` adds
//! the semantic check that every called predicate has at least one clause.

use std::error::Error;
use std::fmt;

use crate::token::Token;

/// An unexpected character or token encountered during tokenization or
/// parsing. Carries a fully formatted, single-line message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionError {
    message: String,
}

impl RecognitionError {
    /// Reports an unexpected character, with the String representations of
    /// the expected character(s), if any.
    pub fn from_char(actual: Option<char>, line: usize, expected: &[&str]) -> Self {
        Self {
            message: message(&escape_char(actual), line, expected),
        }
    }

    /// Reports an unexpected token, with the String representations of the
    /// expected token type(s), if any.
    pub fn from_token(actual: &Token, line: usize, expected: &[&str]) -> Self {
        Self {
            message: message(&actual.to_string(), line, expected),
        }
    }
}

impl fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for RecognitionError {}

fn message(actual: &str, line: usize, expected: &[&str]) -> String {
    let mut msg = format!("{} unexpected at line {}.", actual, line);
    if let Some((first, rest)) = expected.split_first() {
        msg.push_str(" Expected ");
        msg.push_str(first);
        for e in rest {
            msg.push_str(", or ");
            msg.push_str(e);
        }
        msg.push('.');
    }
    msg
}

fn escape_char(actual: Option<char>) -> String {
    match actual {
        None => "<EOF>".to_string(),
        Some('\t') => "\\t".to_string(),
        Some('\n') => "\\n".to_string(),
        Some('\r') => "\\r".to_string(),
        Some(' ') => "' '".to_string(),
        Some(c) => c.to_string(),
    }
}

/// Any error produced while compiling a program or query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A tokenization or parse error.
    Recognition(RecognitionError),
    /// A goal calls a predicate for which no clauses are defined.
    NoClauses { name: String, arity: usize },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Recognition(e) => e.fmt(f),
            CompileError::NoClauses { name, arity } => {
                write!(f, "No clauses defined for predicate {}/{}", name, arity)
            }
        }
    }
}

impl Error for CompileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CompileError::Recognition(e) => Some(e),
            CompileError::NoClauses { .. } => None,
        }
    }
}

impl From<RecognitionError> for CompileError {
    fn from(e: RecognitionError) -> Self {
        CompileError::Recognition(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_message() {
        let e = RecognitionError::from_char(Some('!'), 3, &[]);
        assert_eq!(e.to_string(), "! unexpected at line 3.");
    }

    #[test]
    fn test_char_message_with_expectations() {
        let e = RecognitionError::from_char(None, 2, &["*"]);
        assert_eq!(e.to_string(), "<EOF> unexpected at line 2. Expected *.");
    }

    #[test]
    fn test_token_message() {
        let e = RecognitionError::from_token(&Token::Period, 1, &["RBRACK"]);
        assert_eq!(
            e.to_string(),
            "<.;PERIOD> unexpected at line 1. Expected RBRACK."
        );
    }

    #[test]
    fn test_expectation_list() {
        let e = RecognitionError::from_token(&Token::Comma, 4, &["VAR", "ATOM", "NIL"]);
        assert_eq!(
            e.to_string(),
            "<,;COMMA> unexpected at line 4. Expected VAR, or ATOM, or NIL."
        );
    }

    #[test]
    fn test_whitespace_escapes() {
        assert_eq!(
            RecognitionError::from_char(Some(' '), 1, &[]).to_string(),
            "' ' unexpected at line 1."
        );
        assert_eq!(
            RecognitionError::from_char(Some('\n'), 1, &[]).to_string(),
            "\\n unexpected at line 1."
        );
    }

    #[test]
    fn test_no_clauses_message() {
        let e = CompileError::NoClauses {
            name: "fathers".to_string(),
            arity: 2,
        };
        assert_eq!(e.to_string(), "No clauses defined for predicate fathers/2");
    }
}
