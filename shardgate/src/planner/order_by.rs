use super::{contains_aggregation, OrderBy, PlannerResult, QueryProjection};
use crate::{parser, semantics::Semantics};

impl QueryProjection {
    pub(super) fn add_ordering(
        &mut self,
        order_by: &[parser::OrderBy],
        semantics: &impl Semantics,
    ) -> PlannerResult<()> {
        let mut can_push_down_sorting = true;
        for order in order_by {
            let (expr, sort_key) = self.simplified_expr(&order.expr, semantics)?;
            // ORDER BY NULL is a no-op.
            let Some(sort_key) = sort_key.filter(|sort_key| !sort_key.is_null_literal()) else {
                continue;
            };
            can_push_down_sorting &= !contains_aggregation(&sort_key);
            self.order_by.push(OrderBy {
                inner: parser::OrderBy {
                    expr,
                    order: order.order,
                },
                sort_key,
            });
        }
        self.can_push_down_sorting = can_push_down_sorting;
        Ok(())
    }
}
