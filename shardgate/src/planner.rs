mod aggregate;
mod align;
mod explain;
mod expression;
mod group_by;
mod order_by;
mod projection;
mod simplify;
mod validate;

pub use aggregate::{sort_aggregates, Aggr, AggregateOpcode};
pub use align::compare_index;
pub use explain::{AggregateSummary, ProjectionSummary};
pub use expression::{contains_aggregation, equals_expr, is_aggregation};
pub use projection::{GroupBy, OrderBy, QueryProjection, SelectExpr};

use crate::semantics::SemanticError;
use serde::Serialize;

/// Bind arguments with this prefix stand for subqueries that were pulled
/// out of an expression.
pub const SUBQUERY_ARGUMENT_PREFIX: &str = "__sq";

#[derive(Debug, Clone, thiserror::Error)]
pub enum PlannerError {
    #[error("[BUG] {0}")]
    Internal(String),

    #[error("unsupported: '*' expression in cross-shard query")]
    StarInCrossShardQuery,

    #[error("unsupported: in scatter query: complex aggregate expression")]
    ComplexAggregate,

    #[error("unsupported: in scatter query: aggregation function '{0}'")]
    UnsupportedAggregate(String),

    #[error("unsupported: subqueries disallowed in GROUP BY")]
    SubqueryInGroupBy,

    #[error("aggregate functions take a single argument '{0}'")]
    AggregateArity(String),

    #[error("In aggregated query without GROUP BY, expression of SELECT list contains nonaggregated column '{0}'; this is incompatible with sql_mode=only_full_group_by")]
    MixOfGroupFuncAndFields(String),

    #[error("Expression of SELECT list is not in GROUP BY clause and contains nonaggregated column '{0}' which is not functionally dependent on columns in GROUP BY clause; this is incompatible with sql_mode=only_full_group_by")]
    WrongFieldWithGroup(String),

    #[error("Can't group on '{0}'")]
    WrongGroupField(String),

    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

pub type PlannerResult<T> = std::result::Result<T, PlannerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A shape that parsing should have ruled out.
    Internal,
    /// A valid construct that cross-shard planning does not handle.
    Unimplemented,
    /// A query that MySQL itself would reject.
    InvalidArgument,
    /// Column or table resolution failed.
    Resolution,
}

/// MySQL error number and SQLSTATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SqlState {
    pub errno: u16,
    pub state: &'static str,
}

impl PlannerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Internal(_) => ErrorKind::Internal,
            Self::StarInCrossShardQuery
            | Self::ComplexAggregate
            | Self::UnsupportedAggregate(_)
            | Self::SubqueryInGroupBy
            | Self::AggregateArity(_) => ErrorKind::Unimplemented,
            Self::MixOfGroupFuncAndFields(_)
            | Self::WrongFieldWithGroup(_)
            | Self::WrongGroupField(_) => ErrorKind::InvalidArgument,
            Self::Semantic(_) => ErrorKind::Resolution,
        }
    }

    /// The MySQL error this error mirrors, if any.
    pub fn sql_state(&self) -> Option<SqlState> {
        let errno = match self {
            Self::MixOfGroupFuncAndFields(_) => 1140,
            Self::WrongFieldWithGroup(_) => 1055,
            Self::WrongGroupField(_) => 1056,
            Self::AggregateArity(_) => 1149,
            _ => return None,
        };
        Some(SqlState {
            errno,
            state: "42000",
        })
    }
}
