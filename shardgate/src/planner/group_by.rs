use super::{
    is_aggregation, GroupBy, PlannerError, PlannerResult, QueryProjection,
    SUBQUERY_ARGUMENT_PREFIX,
};
use crate::{parser::Expression, semantics::Semantics};

impl QueryProjection {
    pub(super) fn add_grouping(
        &mut self,
        group_by: &[Expression],
        semantics: &impl Semantics,
    ) -> PlannerResult<()> {
        for expr in group_by {
            let (inner_index, aliased_expr) = self
                .find_select_expr_index_for_expr(expr)
                .map(|(i, aliased)| (Some(i), Some(aliased.clone())))
                .unwrap_or_default();
            let (inner, sort_key) = self.simplified_expr(expr, semantics)?;
            // GROUP BY NULL forms a single group, keyed on the literal.
            let sort_key = sort_key.unwrap_or_else(|| inner.clone());
            check_for_invalid_grouping_expressions(&sort_key)?;
            self.group_by.push(GroupBy {
                inner,
                sort_key,
                inner_index,
                aliased_expr,
            });
        }
        Ok(())
    }
}

fn check_for_invalid_grouping_expressions(expr: &Expression) -> PlannerResult<()> {
    expr.walk(&mut |node| {
        if is_aggregation(node) {
            return Err(PlannerError::WrongGroupField(expr.to_string()));
        }
        match node {
            Expression::Subquery(_) | Expression::Exists(_) => Err(PlannerError::SubqueryInGroupBy),
            Expression::Argument(name) if name.starts_with(SUBQUERY_ARGUMENT_PREFIX) => {
                Err(PlannerError::SubqueryInGroupBy)
            }
            _ => Ok(true),
        }
    })
}
