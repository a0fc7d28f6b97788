use super::{equals_expr, AggregateOpcode, Aggr, QueryProjection};
use crate::parser::Expression;
use serde::Serialize;

/// A readable account of a projection.
///
/// Grouping and ordering keys that sort on something other than what they
/// display carry the sort key, as in `bar asc (key: foo)`.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectionSummary {
    pub select: Vec<String>,
    pub grouping: Vec<String>,
    pub order_by: Vec<String>,
    /// Whether the gateway has to deduplicate rows.
    pub distinct: bool,
    pub can_push_down_sorting: bool,
    pub aggregates: Vec<AggregateSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateSummary {
    pub opcode: AggregateOpcode,
    pub alias: String,
    pub index: Option<usize>,
    pub distinct: bool,
}

impl From<&Aggr> for AggregateSummary {
    fn from(aggr: &Aggr) -> Self {
        Self {
            opcode: aggr.opcode,
            alias: aggr.alias.clone(),
            index: aggr.index,
            distinct: aggr.distinct,
        }
    }
}

impl std::fmt::Display for AggregateSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.opcode, self.alias)?;
        if let Some(index) = self.index {
            write!(f, " #{index}")?;
        }
        let opcode_is_distinct = matches!(
            self.opcode,
            AggregateOpcode::CountDistinct | AggregateOpcode::SumDistinct
        );
        if self.distinct && !opcode_is_distinct {
            f.write_str(" (distinct)")?;
        }
        Ok(())
    }
}

impl ProjectionSummary {
    /// Flattens the summary into (property, value) pairs.
    pub fn rows(&self) -> Vec<(String, String)> {
        let mut rows = Vec::new();
        let mut push = |property: &str, value: String| rows.push((property.to_owned(), value));
        for select in &self.select {
            push("select", select.clone());
        }
        for grouping in &self.grouping {
            push("grouping", grouping.clone());
        }
        for order_by in &self.order_by {
            push("order_by", order_by.clone());
        }
        push("distinct", self.distinct.to_string());
        if !self.order_by.is_empty() {
            push("push_down_sorting", self.can_push_down_sorting.to_string());
        }
        for aggregate in &self.aggregates {
            push("aggregate", aggregate.to_string());
        }
        if let Some(err) = &self.aggregate_error {
            push("aggregate_error", err.clone());
        }
        if let Some(err) = &self.projection_error {
            push("projection_error", err.clone());
        }
        rows
    }
}

impl QueryProjection {
    /// Summarizes the projection, aligning a copy of it first if `align` is
    /// set.
    pub fn summary(&self, align: bool) -> ProjectionSummary {
        if align {
            let mut aligned = self.clone();
            aligned.align_group_by_and_order_by();
            return aligned.summary(false);
        }

        let select = self
            .select_exprs
            .iter()
            .map(|expr| {
                if expr.is_aggregate {
                    format!("aggr: {}", expr.col)
                } else {
                    expr.col.to_string()
                }
            })
            .collect();
        let (aggregates, aggregate_error) = if self.has_aggr {
            match self.aggregation_expressions() {
                Ok(aggregates) => (aggregates.iter().map(AggregateSummary::from).collect(), None),
                Err(err) => (Vec::new(), Some(err.to_string())),
            }
        } else {
            (Vec::new(), None)
        };
        ProjectionSummary {
            select,
            grouping: self
                .group_by
                .iter()
                .map(|g| with_sort_key(g.inner.to_string(), &g.inner, &g.sort_key))
                .collect(),
            order_by: self
                .order_by
                .iter()
                .map(|o| with_sort_key(o.inner.to_string(), &o.inner.expr, &o.sort_key))
                .collect(),
            distinct: self.needs_distinct(),
            can_push_down_sorting: self.can_push_down_sorting,
            aggregates,
            aggregate_error,
            projection_error: self.projection_error.as_ref().map(ToString::to_string),
        }
    }
}

fn with_sort_key(display: String, expr: &Expression, sort_key: &Expression) -> String {
    if equals_expr(expr, sort_key) {
        display
    } else {
        format!("{display} (key: {sort_key})")
    }
}
