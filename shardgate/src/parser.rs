mod expression;
mod query;

pub use expression::{
    BinaryOp, CaseBranch, ColumnRef, Expression, FunctionArgs, FunctionCall, Literal, UnaryOp,
    AGGREGATE_FUNCTIONS,
};
pub use query::{
    AliasedExpr, Join, JoinKind, Order, OrderBy, Select, SelectItem, Statement, TableRef, Union,
};

use crate::lexer::{Lexer, LexerError, Token, KEYWORDS};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ParserError {
    #[error("Unexpected token {0}")]
    UnexpectedToken(String),

    #[error("Every derived table must have its own alias")]
    DerivedTableWithoutAlias,

    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),
}

impl ParserError {
    fn unexpected(token: &Token) -> Self {
        Self::UnexpectedToken(format!("{token:?}"))
    }
}

pub type ParserResult<T> = std::result::Result<T, ParserError>;

/// Splits a script into statements and parses them one at a time.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl Iterator for Parser<'_> {
    type Item = ParserResult<Statement>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lexer.peek() {
                Ok(Token::Eof) => return None,
                Ok(Token::Semicolon) => {
                    if let Err(e) = self.lexer.consume() {
                        return Some(Err(e.into()));
                    }
                }
                Ok(_) => break,
                Err(e) => return Some(Err(e.into())),
            }
        }
        let statement = match self.parse_statement() {
            Ok(statement) => statement,
            Err(e) => return Some(Err(e)),
        };
        Some(match self.expect_one_of(&[Token::Semicolon, Token::Eof]) {
            Ok(()) => Ok(statement),
            Err(e) => Err(e),
        })
    }
}

impl<'a> Parser<'a> {
    pub fn new(s: &'a str) -> Self {
        Self {
            lexer: Lexer::new(s),
        }
    }

    fn parse_statement(&mut self) -> ParserResult<Statement> {
        match self.lexer.peek()? {
            Token::Select | Token::LeftParen => self.parse_query(),
            token => Err(ParserError::unexpected(token)),
        }
    }

    fn parse_comma_separated<T, F>(&mut self, mut f: F) -> ParserResult<Vec<T>>
    where
        F: FnMut(&mut Self) -> ParserResult<T>,
    {
        let mut items = Vec::new();
        loop {
            items.push(f(self)?);
            if !self.lexer.consume_if_eq(Token::Comma)? {
                break;
            }
        }
        Ok(items)
    }

    fn expect(&mut self, expected: Token) -> ParserResult<()> {
        self.expect_one_of(&[expected])
    }

    fn expect_one_of(&mut self, expected: &[Token]) -> ParserResult<()> {
        let actual = self.lexer.consume()?;
        if !expected.contains(&actual) {
            return Err(ParserError::unexpected(&actual));
        }
        Ok(())
    }

    fn expect_identifier(&mut self) -> ParserResult<String> {
        match self.lexer.consume()? {
            Token::Identifier(ident) => Ok(ident),
            token => Err(ParserError::unexpected(&token)),
        }
    }
}

/// Writes an identifier, quoting it with backticks when it would not survive
/// a round trip through the lexer unquoted.
pub(crate) fn fmt_identifier(f: &mut std::fmt::Formatter<'_>, name: &str) -> std::fmt::Result {
    let is_plain = name
        .chars()
        .next()
        .is_some_and(|ch| ch.is_ascii_lowercase() || ch == '_')
        && name
            .chars()
            .all(|ch| crate::lexer::is_valid_identifier_char(ch) && !ch.is_ascii_uppercase())
        && !KEYWORDS.iter().any(|keyword| keyword.eq_ignore_ascii_case(name));
    if is_plain {
        return f.write_str(name);
    }
    f.write_str("`")?;
    for ch in name.chars() {
        if ch == '`' {
            f.write_str("`")?;
        }
        write!(f, "{ch}")?;
    }
    f.write_str("`")
}
