use crate::{
    parser::{Parser, Statement},
    planner::QueryProjection,
    semantics::{Schema, SemTable},
    Error, Result,
};

/// Turns SQL text into query projections.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    schema: Schema,
}

impl Analyzer {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    /// Analyze a single SQL statement.
    pub fn analyze(&self, sql: &str) -> Result<QueryProjection> {
        let mut parser = Parser::new(sql);
        let statement = parser.next().transpose()?.ok_or(Error::NoStatement)?;
        if parser.next().is_some() {
            return Err(Error::MultipleStatements);
        }
        self.analyze_statement(&statement)
    }

    /// Analyze every statement of a script.
    ///
    /// A parse error ends the script, since the parser cannot tell where the
    /// broken statement stops.
    pub fn analyze_all(&self, sql: &str) -> Vec<Result<QueryProjection>> {
        let mut results = Vec::new();
        for statement in Parser::new(sql) {
            match statement {
                Ok(statement) => results.push(self.analyze_statement(&statement)),
                Err(err) => {
                    results.push(Err(err.into()));
                    break;
                }
            }
        }
        results
    }

    pub fn analyze_statement(&self, statement: &Statement) -> Result<QueryProjection> {
        tracing::debug!(%statement, "analyzing");
        let sem_table = SemTable::analyze(statement, &self.schema)?;
        let qp = match statement {
            Statement::Select(select) => QueryProjection::from_select(select, &sem_table)?,
            Statement::Union(union) => QueryProjection::from_union(union, &sem_table)?,
        };
        Ok(qp)
    }
}
