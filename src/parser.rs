//! Recursive-descent parser for the Prolog subset.
//!
//! Grammar (whitespace and comments ignored anywhere):
//!
//! ```text
//! program   = { clause }+ ;
//! clause    = structure , [ ":-" , goals ] , "." ;
//! query     = goals , "." ;
//! goals     = structure , { "," , structure } ;
//! structure = atom , [ "(" , term , { "," , term } , ")" ] ;
//! term      = "[]" | variable | structure ;
//! ```

use crate::ast::{Clause, Program, Query, Term};
use crate::error::RecognitionError;
use crate::lexer::Lexer;
use crate::token::{Token, TokenType};

/// LL(1) parser holding the lexer and one token of lookahead.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Token,
}

impl<'a> Parser<'a> {
    /// Creates a parser for the given input, reading the first token.
    pub fn new(input: &'a str) -> Result<Self, RecognitionError> {
        let mut lexer = Lexer::new(input);
        let lookahead = lexer.next_token()?;
        Ok(Self { lexer, lookahead })
    }

    /// Parses a program: a non-empty sequence of clauses.
    pub fn parse_program(&mut self) -> Result<Program, RecognitionError> {
        let mut clauses = vec![self.clause()?];
        while self.lookahead.token_type() == TokenType::Atom {
            clauses.push(self.clause()?);
        }
        self.expect(TokenType::Eof)?;
        Ok(Program { clauses })
    }

    /// Parses a query: a non-empty sequence of goals terminated by `.`.
    pub fn parse_query(&mut self) -> Result<Query, RecognitionError> {
        let goals = self.goals()?;
        self.expect(TokenType::Period)?;
        self.expect(TokenType::Eof)?;
        Ok(Query { goals })
    }

    // clause = structure , [ ":-" , goals ] , "." ;
    fn clause(&mut self) -> Result<Clause, RecognitionError> {
        let head = self.structure()?;
        let body = if self.lookahead.token_type() == TokenType::Implies {
            self.advance()?;
            self.goals()?
        } else {
            Vec::new()
        };
        self.expect(TokenType::Period)?;
        Ok(Clause { head, body })
    }

    // goals = structure , { "," , structure } ;
    fn goals(&mut self) -> Result<Vec<Term>, RecognitionError> {
        let mut goals = vec![self.structure()?];
        while self.lookahead.token_type() == TokenType::Comma {
            self.advance()?;
            goals.push(self.structure()?);
        }
        Ok(goals)
    }

    // structure = atom , [ "(" , term , { "," , term } , ")" ] ;
    fn structure(&mut self) -> Result<Term, RecognitionError> {
        let functor = match self.expect(TokenType::Atom)? {
            Token::Atom(name) => name,
            _ => unreachable!(),
        };
        if self.lookahead.token_type() != TokenType::LBrack {
            return Ok(Term::Atom(functor));
        }
        self.advance()?;
        let mut args = vec![self.term()?];
        while self.lookahead.token_type() == TokenType::Comma {
            self.advance()?;
            args.push(self.term()?);
        }
        self.expect(TokenType::RBrack)?;
        Ok(Term::Compound { functor, args })
    }

    // term = "[]" | variable | structure ;
    fn term(&mut self) -> Result<Term, RecognitionError> {
        match &self.lookahead {
            Token::Var(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(Term::Var(name))
            }
            Token::Atom(_) => self.structure(),
            Token::Nil => {
                self.advance()?;
                Ok(Term::Nil)
            }
            other => Err(RecognitionError::from_token(
                other,
                self.lexer.line(),
                &["VAR", "ATOM", "NIL"],
            )),
        }
    }

    /// Consumes and returns the lookahead if its type matches, and errs
    /// otherwise.
    fn expect(&mut self, expected: TokenType) -> Result<Token, RecognitionError> {
        if self.lookahead.token_type() == expected {
            self.advance()
        } else {
            Err(RecognitionError::from_token(
                &self.lookahead,
                self.lexer.line(),
                &[&expected.to_string()],
            ))
        }
    }

    /// Advances to the next token, returning the previous lookahead.
    fn advance(&mut self) -> Result<Token, RecognitionError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.lookahead, next))
    }
}

/// Parses a Prolog program from source text.
pub fn parse_program(input: &str) -> Result<Program, RecognitionError> {
    Parser::new(input)?.parse_program()
}

/// Parses a Prolog query from source text.
pub fn parse_query(input: &str) -> Result<Query, RecognitionError> {
    Parser::new(input)?.parse_query()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fact() {
        let program = parse_program("father(zeus, ares).").unwrap();
        assert_eq!(program.clauses.len(), 1);
        assert!(program.clauses[0].is_fact());
        assert_eq!(
            program.clauses[0].head,
            Term::compound("father", vec![Term::atom("zeus"), Term::atom("ares")])
        );
    }

    #[test]
    fn test_parse_rule() {
        let program =
            parse_program("grandparent(X, Z) :- parent(X, Y), parent(Y, Z).").unwrap();
        assert_eq!(program.clauses.len(), 1);
        assert_eq!(program.clauses[0].body.len(), 2);
    }

    #[test]
    fn test_parse_atom_clause() {
        let program = parse_program("sunny.").unwrap();
        assert_eq!(program.clauses[0].head, Term::atom("sunny"));
    }

    #[test]
    fn test_parse_multiple_clauses() {
        let program = parse_program(
            "
            father(zeus, ares).
            father(ares, harmonia).
            ancestor(X, Y) :- father(X, Y).
            ",
        )
        .unwrap();
        assert_eq!(program.clauses.len(), 3);
    }

    #[test]
    fn test_parse_nested_compound() {
        let program = parse_program("append(cons(X,XS),YS,cons(X,ZS)) :- append(XS,YS,ZS).")
            .unwrap();
        let head = &program.clauses[0].head;
        assert_eq!(head.functor_arity(), Some(("append", 3)));
        assert_eq!(head.args()[0].functor_arity(), Some(("cons", 2)));
    }

    #[test]
    fn test_parse_nil_argument() {
        let program = parse_program("append([],YS,YS).").unwrap();
        assert_eq!(program.clauses[0].head.args()[0], Term::Nil);
    }

    #[test]
    fn test_parse_query() {
        let query = parse_query("father(zeus, X), father(X, Y).").unwrap();
        assert_eq!(query.goals.len(), 2);
    }

    #[test]
    fn test_query_rejects_implies() {
        let err = parse_query("foo :- bar.").unwrap_err();
        assert_eq!(
            err.to_string(),
            "<:-;IMPLIES> unexpected at line 1. Expected PERIOD."
        );
    }

    #[test]
    fn test_missing_period() {
        let err = parse_program("foo(a)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "<<EOF>;EOF> unexpected at line 1. Expected PERIOD."
        );
    }

    #[test]
    fn test_unclosed_structure() {
        let err = parse_query("reverse(X,Y.").unwrap_err();
        assert_eq!(
            err.to_string(),
            "<.;PERIOD> unexpected at line 1. Expected RBRACK."
        );
    }

    #[test]
    fn test_variable_cannot_head_a_clause() {
        let err = parse_program("X.").unwrap_err();
        assert_eq!(
            err.to_string(),
            "<X;VAR> unexpected at line 1. Expected ATOM."
        );
    }

    #[test]
    fn test_term_expectations() {
        let err = parse_program("foo(:-).").unwrap_err();
        assert_eq!(
            err.to_string(),
            "<:-;IMPLIES> unexpected at line 1. Expected VAR, or ATOM, or NIL."
        );
    }

    #[test]
    fn test_empty_input() {
        let err = parse_program("").unwrap_err();
        assert_eq!(
            err.to_string(),
            "<<EOF>;EOF> unexpected at line 1. Expected ATOM."
        );
    }
}
