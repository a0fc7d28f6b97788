use crate::parser::{ColumnRef, Expression, SelectItem, Statement, TableRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SemanticError {
    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    #[error("Column '{0}' in field list is ambiguous")]
    AmbiguousColumn(String),

    #[error("Not unique table/alias: '{0}'")]
    NotUniqueTable(String),

    #[error("Unknown column '{column}' in '{table}'")]
    UnknownDerivedColumn { table: String, column: String },
}

pub type SemanticResult<T> = std::result::Result<T, SemanticError>;

/// Known column lists of physical tables.
///
/// Tables that are not listed may have any column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<String>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, name: String, columns: Vec<String>) {
        self.tables.insert(name, columns);
    }

    pub fn columns(&self, table_name: &str) -> Option<&[String]> {
        self.tables
            .get(table_name)
            .or_else(|| self.tables.get(&table_name.to_ascii_lowercase()))
            .map(Vec::as_slice)
    }
}

#[derive(Debug, Clone)]
pub enum TableInfo {
    Real(RealTable),
    Derived(DerivedTable),
}

impl TableInfo {
    /// The name the table is visible as in its scope.
    pub fn name(&self) -> &str {
        match self {
            Self::Real(table) => table.alias.as_deref().unwrap_or(&table.name),
            Self::Derived(table) => &table.alias,
        }
    }

    pub fn as_derived(&self) -> Option<&DerivedTable> {
        match self {
            Self::Derived(table) => Some(table),
            Self::Real(_) => None,
        }
    }

    fn may_have_column(&self, column_name: &str) -> bool {
        match self {
            Self::Real(table) => table.columns.as_ref().map_or(true, |columns| {
                columns
                    .iter()
                    .any(|column| column.eq_ignore_ascii_case(column_name))
            }),
            Self::Derived(table) => table.has_star || table.lists_column(column_name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RealTable {
    pub name: String,
    pub alias: Option<String>,
    /// `None` when the schema does not know the table.
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct DerivedTable {
    pub alias: String,
    pub columns: Vec<String>,
    /// Defining expressions, parallel to `columns`.
    pub exprs: Vec<Expression>,
    /// Whether the select list of the derived query contains `*`, so that
    /// `columns` is not exhaustive.
    pub has_star: bool,
}

impl DerivedTable {
    /// Whether the select list of the derived query names `column_name`
    /// itself, rather than passing it through `*`.
    pub fn lists_column(&self, column_name: &str) -> bool {
        self.columns
            .iter()
            .any(|column| column.eq_ignore_ascii_case(column_name))
    }

    fn new(query: &Statement, alias: String) -> Self {
        let mut columns = Vec::new();
        let mut exprs = Vec::new();
        let mut has_star = false;
        for item in &query.first_select().projections {
            match item {
                SelectItem::Star { .. } => has_star = true,
                SelectItem::Aliased(aliased) => {
                    let name = match (&aliased.alias, &aliased.expr) {
                        (Some(alias), _) => alias.clone(),
                        (None, Expression::Column(column_ref)) => column_ref.column_name.clone(),
                        (None, expr) => expr.to_string(),
                    };
                    columns.push(name);
                    exprs.push(aliased.expr.clone());
                }
            }
        }
        Self {
            alias,
            columns,
            exprs,
            has_star,
        }
    }
}

/// Scope information the planner needs to resolve column references.
pub trait Semantics {
    /// Finds the table a column originates from.
    ///
    /// Returns `Ok(None)` when no table in scope can hold the column, as is
    /// the case for a reference to a select-list alias.
    fn table_info_for_column(&self, column: &ColumnRef) -> SemanticResult<Option<&TableInfo>>;

    /// Rewrites a column of a derived table in terms of the expression that
    /// defines it.
    fn rewrite_derived_expression(
        &self,
        column: &ColumnRef,
        derived: &DerivedTable,
    ) -> SemanticResult<Expression>;
}

/// The tables in scope of the top-level FROM clause of a statement.
#[derive(Debug, Clone, Default)]
pub struct SemTable {
    tables: Vec<TableInfo>,
}

impl SemTable {
    pub fn analyze(statement: &Statement, schema: &Schema) -> SemanticResult<Self> {
        let mut sem_table = Self::default();
        for table_ref in &statement.first_select().from {
            sem_table.collect(table_ref, schema)?;
        }
        tracing::trace!(tables = sem_table.tables.len(), "analyzed FROM clause");
        Ok(sem_table)
    }

    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }

    fn collect(&mut self, table_ref: &TableRef, schema: &Schema) -> SemanticResult<()> {
        let info = match table_ref {
            TableRef::Table { name, alias } => TableInfo::Real(RealTable {
                name: name.clone(),
                alias: alias.clone(),
                columns: schema.columns(name).map(<[String]>::to_vec),
            }),
            TableRef::Derived { query, alias } => {
                TableInfo::Derived(DerivedTable::new(query, alias.clone()))
            }
            TableRef::Join(join) => {
                self.collect(&join.left, schema)?;
                return self.collect(&join.right, schema);
            }
        };
        if self.tables.iter().any(|table| table.name() == info.name()) {
            return Err(SemanticError::NotUniqueTable(info.name().to_owned()));
        }
        self.tables.push(info);
        Ok(())
    }
}

impl Semantics for SemTable {
    fn table_info_for_column(&self, column: &ColumnRef) -> SemanticResult<Option<&TableInfo>> {
        if let Some(table_name) = &column.table_name {
            return self
                .tables
                .iter()
                .find(|table| table.name() == table_name)
                .map(Some)
                .ok_or_else(|| SemanticError::UnknownTable(table_name.clone()));
        }
        let mut candidates = self
            .tables
            .iter()
            .filter(|table| table.may_have_column(&column.column_name));
        let Some(table) = candidates.next() else {
            return Ok(None);
        };
        if candidates.next().is_some() {
            return Err(SemanticError::AmbiguousColumn(column.column_name.clone()));
        }
        Ok(Some(table))
    }

    fn rewrite_derived_expression(
        &self,
        column: &ColumnRef,
        derived: &DerivedTable,
    ) -> SemanticResult<Expression> {
        let position = derived
            .columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(&column.column_name));
        match position {
            Some(i) => Ok(derived.exprs[i].clone()),
            // Passed through by `*`; the underlying table names it the same.
            None if derived.has_star => Ok(Expression::Column(ColumnRef::unqualified(
                column.column_name.clone(),
            ))),
            None => Err(SemanticError::UnknownDerivedColumn {
                table: derived.alias.clone(),
                column: column.column_name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn analyze(sql: &str, schema: &Schema) -> SemTable {
        let statement = Parser::new(sql).next().unwrap().unwrap();
        SemTable::analyze(&statement, schema).unwrap()
    }

    fn column(sql: &str) -> ColumnRef {
        let mut parser = Parser::new(sql);
        match parser.parse_expr().unwrap() {
            Expression::Column(column_ref) => column_ref,
            expr => panic!("not a column: {expr}"),
        }
    }

    #[test]
    fn unqualified_columns_resolve_through_schema() {
        let mut schema = Schema::new();
        schema.add_table("t".to_owned(), vec!["a".to_owned(), "b".to_owned()]);
        schema.add_table("u".to_owned(), vec!["b".to_owned(), "c".to_owned()]);
        let sem_table = analyze("select 1 from t join u on t.a = u.c", &schema);

        let table = sem_table.table_info_for_column(&column("a")).unwrap();
        assert_eq!(table.map(TableInfo::name), Some("t"));
        let table = sem_table.table_info_for_column(&column("c")).unwrap();
        assert_eq!(table.map(TableInfo::name), Some("u"));
        assert!(matches!(
            sem_table.table_info_for_column(&column("b")),
            Err(SemanticError::AmbiguousColumn(_))
        ));
        assert!(sem_table
            .table_info_for_column(&column("x"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn unknown_tables_may_hold_any_column() {
        let sem_table = analyze("select 1 from t", &Schema::new());
        let table = sem_table.table_info_for_column(&column("anything")).unwrap();
        assert_eq!(table.map(TableInfo::name), Some("t"));
    }

    #[test]
    fn qualified_columns_use_aliases() {
        let sem_table = analyze("select 1 from t as x, (select a as b from u) d", &Schema::new());
        let table = sem_table.table_info_for_column(&column("x.a")).unwrap();
        assert_eq!(table.map(TableInfo::name), Some("x"));
        assert!(matches!(
            sem_table.table_info_for_column(&column("t.a")),
            Err(SemanticError::UnknownTable(_))
        ));

        let derived = sem_table
            .table_info_for_column(&column("d.b"))
            .unwrap()
            .and_then(TableInfo::as_derived)
            .unwrap();
        assert_eq!(derived.columns, vec!["b".to_owned()]);
        let rewritten = sem_table
            .rewrite_derived_expression(&column("d.b"), derived)
            .unwrap();
        assert_eq!(rewritten.to_string(), "a");
        assert!(sem_table
            .rewrite_derived_expression(&column("d.c"), derived)
            .is_err());
    }

    #[test]
    fn duplicate_aliases_are_rejected() {
        let statement = Parser::new("select 1 from t, u as t").next().unwrap().unwrap();
        let err = SemTable::analyze(&statement, &Schema::new()).unwrap_err();
        assert_eq!(err.to_string(), "Not unique table/alias: 't'");
    }
}
