use super::{
    aggregate::check_for_invalid_aggregations, contains_aggregation, equals_expr, PlannerError,
    PlannerResult,
};
use crate::{
    parser::{self, AliasedExpr, Expression, Order, Select, SelectItem, Union},
    semantics::Semantics,
};

/// One item of the select list.
#[derive(Debug, Clone)]
pub struct SelectExpr {
    pub col: SelectItem,
    pub is_aggregate: bool,
}

impl SelectExpr {
    pub fn get_expr(&self) -> PlannerResult<&Expression> {
        match &self.col {
            SelectItem::Aliased(aliased) => Ok(&aliased.expr),
            SelectItem::Star { .. } => Err(PlannerError::Internal(format!(
                "{} does not have expr",
                self.col
            ))),
        }
    }

    pub fn get_aliased_expr(&self) -> PlannerResult<&AliasedExpr> {
        self.as_aliased().ok_or(PlannerError::StarInCrossShardQuery)
    }

    pub(super) fn as_aliased(&self) -> Option<&AliasedExpr> {
        match &self.col {
            SelectItem::Aliased(aliased) => Some(aliased),
            SelectItem::Star { .. } => None,
        }
    }
}

/// A grouping key.
#[derive(Debug, Clone)]
pub struct GroupBy {
    /// The expression as written.
    pub inner: Expression,
    /// The expression grouping actually compares, with aliases and derived
    /// columns resolved.
    pub sort_key: Expression,
    /// Position of the key in the select list, if the user selected it.
    pub inner_index: Option<usize>,
    pub(super) aliased_expr: Option<AliasedExpr>,
}

impl GroupBy {
    pub fn new(inner: Expression, sort_key: Expression, inner_index: Option<usize>) -> Self {
        Self {
            inner,
            sort_key,
            inner_index,
            aliased_expr: None,
        }
    }

    pub fn as_order_by(&self) -> OrderBy {
        OrderBy {
            inner: parser::OrderBy {
                expr: self.inner.clone(),
                order: Order::Asc,
            },
            sort_key: self.sort_key.clone(),
        }
    }

    pub fn as_aliased_expr(&self) -> PlannerResult<AliasedExpr> {
        if let Some(aliased_expr) = &self.aliased_expr {
            return Ok(aliased_expr.clone());
        }
        if equals_expr(&self.sort_key, &self.inner) {
            return Ok(AliasedExpr::new(self.sort_key.clone()));
        }
        match &self.inner {
            Expression::Column(column_ref) => Ok(AliasedExpr {
                expr: self.sort_key.clone(),
                alias: Some(column_ref.column_name.clone()),
            }),
            inner => Err(PlannerError::Internal(format!(
                "grouping key {inner} differs from its sort key {} but is not a column",
                self.sort_key
            ))),
        }
    }
}

/// A sort key.
#[derive(Debug, Clone)]
pub struct OrderBy {
    /// The expression and direction as written.
    pub inner: parser::OrderBy,
    pub sort_key: Expression,
}

/// What a SELECT or UNION projects, groups by and orders by, in the shape
/// cross-shard planning needs.
#[derive(Debug, Clone)]
pub struct QueryProjection {
    pub select_exprs: Vec<SelectExpr>,
    pub has_aggr: bool,
    pub distinct: bool,
    pub(super) group_by: Vec<GroupBy>,
    pub order_by: Vec<OrderBy>,
    pub can_push_down_sorting: bool,
    pub has_star: bool,
    /// A violation of `ONLY_FULL_GROUP_BY` that only matters if the plan
    /// ends up aggregating on the gateway. Nothing raises it implicitly.
    pub projection_error: Option<PlannerError>,
}

impl QueryProjection {
    fn new(distinct: bool) -> Self {
        Self {
            select_exprs: Vec::new(),
            has_aggr: false,
            distinct,
            group_by: Vec::new(),
            order_by: Vec::new(),
            can_push_down_sorting: true,
            has_star: false,
            projection_error: None,
        }
    }

    pub fn from_select(select: &Select, semantics: &impl Semantics) -> PlannerResult<Self> {
        let mut qp = Self::new(select.distinct);
        qp.add_select_expressions(&select.projections)?;
        qp.add_grouping(&select.group_by, semantics)?;
        qp.add_ordering(&select.order_by, semantics)?;
        qp.validate_grouping()?;

        // DISTINCT without aggregation deduplicates rows instead of grouping.
        if qp.distinct && !qp.has_aggr {
            qp.group_by.clear();
        }
        tracing::debug!(
            select_exprs = qp.select_exprs.len(),
            grouping = qp.group_by.len(),
            ordering = qp.order_by.len(),
            has_aggr = qp.has_aggr,
            deferred_error = qp.projection_error.is_some(),
            "built projection for SELECT"
        );
        Ok(qp)
    }

    /// Builds the projection of a UNION from the select list of its first
    /// SELECT and the ORDER BY of the UNION itself.
    pub fn from_union(union: &Union, semantics: &impl Semantics) -> PlannerResult<Self> {
        let mut qp = Self::new(false);
        qp.add_select_expressions(&union.first_select().projections)?;
        qp.add_ordering(&union.order_by, semantics)?;
        tracing::debug!(
            select_exprs = qp.select_exprs.len(),
            ordering = qp.order_by.len(),
            "built projection for UNION"
        );
        Ok(qp)
    }

    fn add_select_expressions(&mut self, projections: &[SelectItem]) -> PlannerResult<()> {
        for item in projections {
            let is_aggregate = match item {
                SelectItem::Star { .. } => {
                    self.has_star = true;
                    false
                }
                SelectItem::Aliased(aliased) => {
                    check_for_invalid_aggregations(&aliased.expr)?;
                    contains_aggregation(&aliased.expr)
                }
            };
            self.has_aggr |= is_aggregate;
            self.select_exprs.push(SelectExpr {
                col: item.clone(),
                is_aggregate,
            });
        }
        Ok(())
    }

    pub fn needs_aggregation(&self) -> bool {
        self.has_aggr || !self.group_by.is_empty()
    }

    fn only_aggr(&self) -> bool {
        self.has_aggr && self.select_exprs.iter().all(|expr| expr.is_aggregate)
    }

    /// Whether the gateway has to deduplicate rows.
    pub fn needs_distinct(&self) -> bool {
        if !self.distinct {
            return false;
        }
        // A single aggregated row is distinct already.
        !(self.only_aggr() && self.group_by.is_empty())
    }

    /// Returns a copy of the grouping keys.
    pub fn grouping(&self) -> Vec<GroupBy> {
        self.group_by.clone()
    }

    pub fn add_group_by(&mut self, group_by: GroupBy) {
        self.group_by.push(group_by);
    }

    /// Finds the select-list item `expr` refers to, either by naming its
    /// alias or by being the same expression.
    ///
    /// Only a bare column names an alias. The qualifier is not ignored, so
    /// `t.x` does not find `a AS x` and gets no select-list position, as in
    /// MySQL name resolution.
    pub fn find_select_expr_index_for_expr(
        &self,
        expr: &Expression,
    ) -> Option<(usize, &AliasedExpr)> {
        let column_name = expr
            .as_column()
            .filter(|column_ref| column_ref.table_name.is_none())
            .map(|column_ref| &column_ref.column_name);
        self.select_exprs
            .iter()
            .enumerate()
            .filter_map(|(i, select_expr)| Some((i, select_expr.as_aliased()?)))
            .find(|(_, aliased)| {
                column_name.is_some_and(|name| aliased.has_alias(name))
                    || equals_expr(&aliased.expr, expr)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        parser::{Parser, Statement},
        planner::ErrorKind,
        semantics::{Schema, SemTable},
    };
    use pretty_assertions::assert_eq;

    fn projection(sql: &str) -> PlannerResult<QueryProjection> {
        let statement = Parser::new(sql).next().unwrap().unwrap();
        let sem_table = SemTable::analyze(&statement, &Schema::new()).unwrap();
        match &statement {
            Statement::Select(select) => QueryProjection::from_select(select, &sem_table),
            Statement::Union(union) => QueryProjection::from_union(union, &sem_table),
        }
    }

    fn expr(sql: &str) -> Expression {
        Parser::new(sql).parse_expr().unwrap()
    }

    #[test]
    fn distinct_single_row_aggregate_needs_no_dedup() {
        let qp = projection("select distinct count(*), sum(a) from t").unwrap();
        assert!(qp.distinct);
        assert!(!qp.needs_distinct());

        let qp = projection("select distinct a, count(*) from t group by a").unwrap();
        assert!(qp.needs_distinct());

        let qp = projection("select distinct a, b from t group by a, b").unwrap();
        assert!(qp.needs_distinct());
        assert!(qp.grouping().is_empty());
        assert!(!qp.needs_aggregation());
    }

    #[test]
    fn alias_lookup_needs_bare_column() {
        let qp = projection("select a + 1 as x, b from t").unwrap();
        let (i, aliased) = qp.find_select_expr_index_for_expr(&expr("x")).unwrap();
        assert_eq!((i, aliased.expr.to_string()), (0, "a + 1".to_owned()));
        assert!(qp.find_select_expr_index_for_expr(&expr("t.x")).is_none());

        let qp = projection("select a as x, count(*) from t group by t.x").unwrap();
        assert_eq!(qp.grouping()[0].inner_index, None);
        let qp = projection("select a as x, count(*) from t group by x").unwrap();
        assert_eq!(qp.grouping()[0].inner_index, Some(0));
        assert_eq!(
            qp.find_select_expr_index_for_expr(&expr("B")).map(|(i, _)| i),
            Some(1)
        );
        assert_eq!(
            qp.find_select_expr_index_for_expr(&expr("a+1")).map(|(i, _)| i),
            Some(0)
        );
    }

    #[test]
    fn grouping_key_as_aliased_expr() {
        let qp = projection("select a as x, count(*) from t group by x, b").unwrap();
        let grouping = qp.grouping();
        let selected = grouping[0].as_aliased_expr().unwrap();
        assert_eq!(
            (selected.expr.to_string(), selected.alias),
            ("a".to_owned(), Some("x".to_owned()))
        );
        let unselected = grouping[1].as_aliased_expr().unwrap();
        assert_eq!(
            (unselected.expr.to_string(), unselected.alias),
            ("b".to_owned(), None)
        );

        let renamed = GroupBy::new(expr("y"), expr("a + b"), None);
        let aliased = renamed.as_aliased_expr().unwrap();
        assert_eq!(
            (aliased.expr.to_string(), aliased.alias),
            ("a + b".to_owned(), Some("y".to_owned()))
        );
        let broken = GroupBy::new(expr("y + 1"), expr("a"), None);
        assert!(matches!(
            broken.as_aliased_expr(),
            Err(PlannerError::Internal(_))
        ));
    }

    #[test]
    fn star_has_no_aliased_expr() {
        let qp = projection("select *, a from t").unwrap();
        assert!(qp.has_star);
        assert!(matches!(
            qp.select_exprs[0].get_aliased_expr(),
            Err(PlannerError::StarInCrossShardQuery)
        ));
        assert!(matches!(
            qp.select_exprs[0].get_expr(),
            Err(PlannerError::Internal(_))
        ));
        assert_eq!(qp.select_exprs[1].get_expr().unwrap().to_string(), "a");
    }

    #[test]
    fn deferred_error_is_kept_not_raised() {
        let qp = projection("select a, b, count(*) from t group by a").unwrap();
        let err = qp.projection_error.unwrap();
        assert!(matches!(&err, PlannerError::WrongFieldWithGroup(column) if column == "b"));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = projection("select a, count(*) from t").unwrap_err();
        assert!(matches!(&err, PlannerError::MixOfGroupFuncAndFields(column) if column == "a"));
        assert_eq!(err.sql_state().map(|state| state.errno), Some(1140));
    }

    #[test]
    fn union_uses_first_select_and_outer_order() {
        let qp = projection("select a, b from t union select c, d from u order by a desc").unwrap();
        assert_eq!(
            qp.select_exprs
                .iter()
                .map(|expr| expr.col.to_string())
                .collect::<Vec<_>>(),
            vec!["a".to_owned(), "b".to_owned()]
        );
        assert_eq!(qp.order_by.len(), 1);
        assert_eq!(qp.order_by[0].inner.to_string(), "a desc");
        assert!(!qp.distinct);
    }
}
