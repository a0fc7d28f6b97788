use super::{align::compare_index, PlannerError, PlannerResult, QueryProjection};
use crate::parser::{AliasedExpr, Expression, FunctionCall};
use serde::Serialize;

/// How the gateway merges per-shard results of an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOpcode {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    GroupConcat,
    CountDistinct,
    SumDistinct,
}

impl std::fmt::Display for AggregateOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Avg => "avg",
            Self::GroupConcat => "group_concat",
            Self::CountDistinct => "count_distinct",
            Self::SumDistinct => "sum_distinct",
        })
    }
}

impl AggregateOpcode {
    /// Looks up the opcode of an aggregate function by name.
    pub fn from_name(name: &str) -> Option<Self> {
        let opcode = match name.to_ascii_lowercase().as_str() {
            "count" => Self::Count,
            "sum" => Self::Sum,
            "min" => Self::Min,
            "max" => Self::Max,
            "avg" => Self::Avg,
            "group_concat" => Self::GroupConcat,
            _ => return None,
        };
        Some(opcode)
    }

    fn with_distinct(self) -> Self {
        match self {
            Self::Count => Self::CountDistinct,
            Self::Sum => Self::SumDistinct,
            opcode => opcode,
        }
    }
}

/// An aggregate function call in the select list.
#[derive(Debug, Clone)]
pub struct Aggr {
    pub original: AliasedExpr,
    pub func: FunctionCall,
    pub opcode: AggregateOpcode,
    /// Name of the output column.
    pub alias: String,
    /// Position in the select list, if the user selected it.
    pub index: Option<usize>,
    pub distinct: bool,
}

impl QueryProjection {
    /// Lists the aggregates the gateway has to compute when merging shard
    /// results, in select-list order.
    pub fn aggregation_expressions(&self) -> PlannerResult<Vec<Aggr>> {
        let mut aggregates = Vec::new();
        for (i, select_expr) in self.select_exprs.iter().enumerate() {
            if !select_expr.is_aggregate {
                continue;
            }
            let aliased = select_expr.get_aliased_expr()?;
            let Expression::Function(func) = &aliased.expr else {
                return Err(PlannerError::ComplexAggregate);
            };
            let name = func.name.to_ascii_lowercase();
            let Some(opcode) = AggregateOpcode::from_name(&name) else {
                return Err(PlannerError::UnsupportedAggregate(name));
            };
            let opcode = if func.distinct {
                opcode.with_distinct()
            } else {
                opcode
            };
            let alias = aliased
                .alias
                .clone()
                .unwrap_or_else(|| aliased.expr.to_string());
            aggregates.push(Aggr {
                original: aliased.clone(),
                func: func.clone(),
                opcode,
                alias,
                index: Some(i),
                distinct: func.distinct,
            });
        }
        Ok(aggregates)
    }
}

/// Sorts aggregates by select-list position. Aggregates without a position
/// go last, keeping their relative order.
pub fn sort_aggregates(aggregates: &mut [Aggr]) {
    aggregates.sort_by(|a, b| compare_index(a.index, b.index));
}

/// Rejects aggregate calls that do not take exactly one argument.
pub(super) fn check_for_invalid_aggregations(expr: &Expression) -> PlannerResult<()> {
    expr.walk(&mut |node| match node {
        Expression::Function(func) if func.is_aggregate() && func.arg_count() != 1 => {
            Err(PlannerError::AggregateArity(node.to_string()))
        }
        _ => Ok(true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        parser::{Parser, Statement},
        semantics::{Schema, SemTable},
    };
    use pretty_assertions::assert_eq;

    fn projection(sql: &str) -> PlannerResult<QueryProjection> {
        let statement = Parser::new(sql).next().unwrap().unwrap();
        let sem_table = SemTable::analyze(&statement, &Schema::new()).unwrap();
        let Statement::Select(select) = &statement else {
            panic!("not a SELECT");
        };
        QueryProjection::from_select(select, &sem_table)
    }

    #[test]
    fn opcodes_and_aliases() {
        let qp = projection(
            "select a, count(distinct b), sum(c) as total, group_concat(d) from t group by a",
        )
        .unwrap();
        let aggregates = qp.aggregation_expressions().unwrap();
        assert_eq!(
            aggregates
                .iter()
                .map(|aggr| (aggr.opcode, aggr.alias.as_str(), aggr.index, aggr.distinct))
                .collect::<Vec<_>>(),
            vec![
                (
                    AggregateOpcode::CountDistinct,
                    "count(distinct b)",
                    Some(1),
                    true
                ),
                (AggregateOpcode::Sum, "total", Some(2), false),
                (AggregateOpcode::GroupConcat, "group_concat(d)", Some(3), false),
            ]
        );
    }

    #[test]
    fn wrapped_aggregate_is_complex() {
        let qp = projection("select count(*) + 1 from t").unwrap();
        assert!(matches!(
            qp.aggregation_expressions(),
            Err(PlannerError::ComplexAggregate)
        ));
    }

    #[test]
    fn aggregate_without_opcode_is_unsupported() {
        let qp = projection("select std(a) from t").unwrap();
        match qp.aggregation_expressions() {
            Err(PlannerError::UnsupportedAggregate(name)) => assert_eq!(name, "std"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn aggregate_arity_is_checked_eagerly() {
        let err = projection("select a, count(a, b) from t").unwrap_err();
        assert!(matches!(err, PlannerError::AggregateArity(_)));
        assert_eq!(err.sql_state().map(|state| state.errno), Some(1149));
    }

    #[test]
    fn sorting_puts_unplaced_aggregates_last() {
        let qp = projection("select max(a), min(b), avg(c) from t").unwrap();
        let mut aggregates = qp.aggregation_expressions().unwrap();
        aggregates[0].index = None;
        aggregates[1].index = Some(5);
        aggregates[2].index = Some(0);
        sort_aggregates(&mut aggregates);
        assert_eq!(
            aggregates.iter().map(|aggr| aggr.opcode).collect::<Vec<_>>(),
            vec![
                AggregateOpcode::Avg,
                AggregateOpcode::Min,
                AggregateOpcode::Max
            ]
        );
    }
}
