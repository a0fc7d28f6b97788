use shardgate::{Analyzer, Error};
use sqllogictest::{
    harness::{self, Arguments, Trial},
    strict_column_validator, DBOutput, Runner,
};

fn main() {
    let paths = harness::glob("tests/slt/**/*.slt").expect("failed to find test files");
    let tests: Vec<_> = paths
        .map(|entry| {
            let path = entry.expect("failed to read glob entry");
            let name = path.display().to_string();
            Trial::test(name, move || {
                let mut tester = Runner::new(|| async { Ok(Database::default()) });
                tester.with_column_validator(strict_column_validator);
                tester.run_file(&path)?;
                Ok(())
            })
        })
        .collect();
    assert!(!tests.is_empty(), "no sqllogictest found");
    harness::run(&Arguments::from_args(), tests).exit()
}

/// Answers each query with the summary of its projection, one
/// (property, value) row per item.
///
/// Lines starting with `.` configure the database instead:
/// `.table NAME COL...` declares the columns of a table and
/// `.align on|off` toggles alignment of grouping and ordering.
#[derive(Default)]
struct Database {
    analyzer: Analyzer,
    align: bool,
}

impl sqllogictest::DB for Database {
    type Error = Error;
    type ColumnType = ColumnType;

    fn run(&mut self, sql: &str) -> Result<DBOutput<Self::ColumnType>, Self::Error> {
        if let Some(command) = sql.trim().strip_prefix('.') {
            self.run_command(command);
            return Ok(DBOutput::StatementComplete(0));
        }
        let projection = self.analyzer.analyze(sql)?;
        let rows = projection
            .summary(self.align)
            .rows()
            .into_iter()
            .map(|(property, value)| vec![property, value])
            .collect();
        Ok(DBOutput::Rows {
            types: vec![ColumnType::Text, ColumnType::Text],
            rows,
        })
    }
}

impl Database {
    fn run_command(&mut self, command: &str) {
        let mut args = command.split_whitespace();
        match args.next() {
            Some("table") => {
                let name = args.next().expect("missing table name");
                let columns = args.map(str::to_owned).collect();
                self.analyzer
                    .schema_mut()
                    .add_table(name.to_owned(), columns);
            }
            Some("align") => {
                self.align = match args.next() {
                    Some("on") => true,
                    Some("off") => false,
                    arg => panic!("invalid .align argument {arg:?}"),
                };
            }
            _ => panic!("unknown command {command:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ColumnType {
    Text,
}

impl sqllogictest::ColumnType for ColumnType {
    fn from_char(value: char) -> Option<Self> {
        match value {
            'T' => Some(Self::Text),
            _ => None,
        }
    }

    fn to_char(&self) -> char {
        match self {
            Self::Text => 'T',
        }
    }
}
