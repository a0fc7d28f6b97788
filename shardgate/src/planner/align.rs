use super::{equals_expr, GroupBy, QueryProjection};
use std::cmp::Ordering;

/// Orders optional select-list positions with absent positions last.
///
/// Two absent positions compare equal, so a stable sort keeps their
/// relative order.
pub fn compare_index(a: Option<usize>, b: Option<usize>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl QueryProjection {
    /// Reorders the grouping keys so that one sort serves both grouping and
    /// ORDER BY, extending ORDER BY where needed.
    ///
    /// GROUP BY is a set, so its keys can be put in any order. ORDER BY can
    /// take extra trailing keys without changing the result. Aligning twice
    /// changes nothing the second time.
    pub fn align_group_by_and_order_by(&mut self) {
        if self.order_by.is_empty() {
            // Any order will do, so follow the select list.
            self.group_by
                .sort_by(|a, b| compare_index(a.inner_index, b.inner_index));
            self.order_by = self.group_by.iter().map(GroupBy::as_order_by).collect();
            tracing::trace!(keys = self.group_by.len(), "synthesized ORDER BY from GROUP BY");
            return;
        }

        let mut used = vec![false; self.group_by.len()];
        let mut grouping = Vec::with_capacity(self.group_by.len());
        for order in &self.order_by {
            // An ORDER BY key claims every grouping key it equals.
            for (i, group_by) in self.group_by.iter().enumerate() {
                if !used[i] && equals_expr(&group_by.sort_key, &order.sort_key) {
                    used[i] = true;
                    grouping.push(group_by.clone());
                }
            }
        }
        let matched = grouping.len();
        for (group_by, _) in self.group_by.iter().zip(&used).filter(|(_, used)| !**used) {
            grouping.push(group_by.clone());
            self.order_by.push(group_by.as_order_by());
        }
        tracing::trace!(
            matched,
            appended = grouping.len() - matched,
            "aligned GROUP BY with ORDER BY"
        );
        self.group_by = grouping;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        parser::{Parser, Statement},
        semantics::{Schema, SemTable},
    };
    use pretty_assertions::assert_eq;

    fn projection(sql: &str) -> QueryProjection {
        let statement = Parser::new(sql).next().unwrap().unwrap();
        let sem_table = SemTable::analyze(&statement, &Schema::new()).unwrap();
        match &statement {
            Statement::Select(select) => QueryProjection::from_select(select, &sem_table).unwrap(),
            Statement::Union(union) => QueryProjection::from_union(union, &sem_table).unwrap(),
        }
    }

    fn rendered(qp: &QueryProjection) -> (Vec<String>, Vec<String>) {
        (
            qp.group_by.iter().map(|g| g.inner.to_string()).collect(),
            qp.order_by.iter().map(|o| o.inner.to_string()).collect(),
        )
    }

    #[test]
    fn index_comparator_puts_absent_last() {
        assert_eq!(compare_index(Some(0), Some(2)), Ordering::Less);
        assert_eq!(compare_index(Some(2), Some(0)), Ordering::Greater);
        assert_eq!(compare_index(Some(5), None), Ordering::Less);
        assert_eq!(compare_index(None, Some(5)), Ordering::Greater);
        assert_eq!(compare_index(None, None), Ordering::Equal);
    }

    #[test]
    fn explicit_order_leads_and_unordered_keys_trail() {
        let mut qp = projection("select a, b, count(*) from t group by b, a order by a");
        qp.align_group_by_and_order_by();
        assert_eq!(
            rendered(&qp),
            (
                vec!["a".to_owned(), "b".to_owned()],
                vec!["a asc".to_owned(), "b asc".to_owned()]
            )
        );
    }

    #[test]
    fn missing_order_follows_select_list() {
        let mut qp = projection("select c, x, a, count(*) from t group by a, c, d");
        qp.align_group_by_and_order_by();
        assert_eq!(
            qp.group_by.iter().map(|g| g.inner_index).collect::<Vec<_>>(),
            vec![Some(0), Some(2), None]
        );
        assert_eq!(
            rendered(&qp),
            (
                vec!["c".to_owned(), "a".to_owned(), "d".to_owned()],
                vec!["c asc".to_owned(), "a asc".to_owned(), "d asc".to_owned()]
            )
        );
    }

    #[test]
    fn absent_indices_keep_their_order() {
        let mut qp = projection("select count(*) from t group by z, y, x");
        qp.align_group_by_and_order_by();
        assert_eq!(
            rendered(&qp).0,
            vec!["z".to_owned(), "y".to_owned(), "x".to_owned()]
        );
    }

    #[test]
    fn alignment_is_idempotent() {
        for sql in [
            "select a, b, count(*) from t group by b, a order by a",
            "select b, a, count(*) from t group by a, b",
            "select a, b, c, count(*) from t group by c, b, a order by b desc, a",
            "select a as x, count(*) from t group by x order by x desc",
            "select a, count(*) from t group by a, a order by a",
        ] {
            let mut qp = projection(sql);
            qp.align_group_by_and_order_by();
            let once = rendered(&qp);
            qp.align_group_by_and_order_by();
            assert_eq!(rendered(&qp), once, "{sql}");
        }
    }

    #[test]
    fn duplicate_grouping_keys_share_one_order_key() {
        let mut qp = projection("select a, count(*) from t group by a, b, a order by a");
        qp.align_group_by_and_order_by();
        assert_eq!(
            rendered(&qp),
            (
                vec!["a".to_owned(), "a".to_owned(), "b".to_owned()],
                vec!["a asc".to_owned(), "b asc".to_owned()]
            )
        );
    }

    #[test]
    fn added_group_by_is_aligned() {
        let mut qp = projection("select a, count(*) from t group by a order by a");
        let extra = Parser::new("b").parse_expr().unwrap();
        qp.add_group_by(GroupBy::new(extra.clone(), extra, None));
        qp.align_group_by_and_order_by();
        assert_eq!(
            rendered(&qp),
            (
                vec!["a".to_owned(), "b".to_owned()],
                vec!["a asc".to_owned(), "b asc".to_owned()]
            )
        );
    }
}
