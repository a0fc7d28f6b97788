use super::{contains_aggregation, equals_expr, PlannerError, PlannerResult, QueryProjection};
use crate::parser::Expression;

impl QueryProjection {
    /// Checks that everything selected or ordered on without aggregation is
    /// grouped on, as `ONLY_FULL_GROUP_BY` demands.
    ///
    /// Without GROUP BY a violation fails right away. With GROUP BY it is
    /// kept in `projection_error` for the caller to raise if the plan needs
    /// the gateway to aggregate.
    pub(super) fn validate_grouping(&mut self) -> PlannerResult<()> {
        if !self.needs_aggregation() {
            return Ok(());
        }
        let Some(column) = self.find_ungrouped_expression() else {
            return Ok(());
        };
        if self.group_by.is_empty() {
            return Err(PlannerError::MixOfGroupFuncAndFields(column));
        }
        tracing::debug!(%column, "deferring ONLY_FULL_GROUP_BY violation");
        self.projection_error = Some(PlannerError::WrongFieldWithGroup(column));
        Ok(())
    }

    /// Returns the rendering of the first non-aggregated select item or sort
    /// key that is not a grouping key.
    fn find_ungrouped_expression(&self) -> Option<String> {
        for select_expr in &self.select_exprs {
            if select_expr.is_aggregate {
                continue;
            }
            let is_grouped = select_expr
                .get_expr()
                .is_ok_and(|expr| self.is_grouping_key(expr));
            if !is_grouped {
                return Some(select_expr.col.to_string());
            }
        }
        self.order_by
            .iter()
            .filter(|order| {
                !order.inner.expr.is_null_literal() && !contains_aggregation(&order.sort_key)
            })
            .find(|order| !self.is_grouping_key(&order.sort_key))
            .map(|order| order.inner.expr.to_string())
    }

    fn is_grouping_key(&self, expr: &Expression) -> bool {
        self.group_by
            .iter()
            .any(|group_by| equals_expr(&group_by.sort_key, expr))
    }
}
