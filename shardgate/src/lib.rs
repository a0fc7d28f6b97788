pub mod lexer;
pub mod parser;
pub mod planner;
pub mod semantics;

mod analyzer;

pub use analyzer::Analyzer;
pub use lexer::LexerError;
pub use parser::{ParserError, Statement};
pub use planner::{ErrorKind, PlannerError, ProjectionSummary, QueryProjection};
pub use semantics::{Schema, SemanticError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parser error: {0}")]
    Parse(#[from] ParserError),

    #[error("Semantic error: {0}")]
    Semantic(#[from] SemanticError),

    #[error("Planner error: {0}")]
    Planner(#[from] PlannerError),

    #[error("No statement")]
    NoStatement,

    #[error("Multiple statements")]
    MultipleStatements,
}

pub type Result<T> = std::result::Result<T, Error>;
