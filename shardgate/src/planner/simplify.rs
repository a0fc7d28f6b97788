use super::{PlannerResult, QueryProjection, SelectExpr};
use crate::{
    parser::Expression,
    semantics::{SemanticError, Semantics, TableInfo},
};

impl QueryProjection {
    /// Resolves an ORDER BY or GROUP BY expression into the expression to
    /// display and the expression to sort or group on.
    ///
    /// The sort key is `None` for a NULL literal, which orders nothing.
    /// A column naming a derived table column sorts on the expression that
    /// defines it, and a bare column naming a select-list alias sorts on the
    /// aliased expression:
    ///
    /// ```sql
    /// SELECT foo AS bar, weight_string(foo) FROM music ORDER BY bar
    /// ```
    ///
    /// sorts on `foo`, not on a column called `bar`.
    pub fn simplified_expr(
        &self,
        expr: &Expression,
        semantics: &impl Semantics,
    ) -> PlannerResult<(Expression, Option<Expression>)> {
        if expr.is_null_literal() {
            return Ok((expr.clone(), None));
        }
        let Some(column) = expr.as_column() else {
            return Ok((expr.clone(), Some(expr.clone())));
        };

        let table = match semantics.table_info_for_column(column) {
            Ok(table) => table,
            Err(SemanticError::AmbiguousColumn(_)) => None,
            Err(err) => return Err(err.into()),
        };
        let aliased = if column.table_name.is_none() {
            self.select_exprs
                .iter()
                .filter_map(SelectExpr::as_aliased)
                .find(|aliased| aliased.has_alias(&column.column_name))
        } else {
            None
        };
        if let Some(derived) = table.and_then(TableInfo::as_derived) {
            // A name the derived table only passes through `*` may be an
            // alias of the select list instead.
            let passed_through = !derived.lists_column(&column.column_name);
            if !(passed_through && aliased.is_some()) {
                let sort_key = semantics.rewrite_derived_expression(column, derived)?;
                tracing::trace!(%expr, %sort_key, table = %derived.alias, "resolved derived column");
                return Ok((expr.clone(), Some(sort_key)));
            }
        }

        if let Some(aliased) = aliased {
            tracing::trace!(%expr, sort_key = %aliased.expr, "resolved alias");
            return Ok((expr.clone(), Some(aliased.expr.clone())));
        }

        Ok((expr.clone(), Some(expr.clone())))
    }
}
