use anyhow::Result;
use clap::{Parser, ValueEnum};
use rustyline::{
    completion::{extract_word, Completer},
    error::ReadlineError,
    highlight::Highlighter,
    hint::Hinter,
    validate::Validator,
    Editor, Helper,
};
use shardgate::{
    lexer::{is_valid_identifier_char, LexerError, SegmentKind, Segmenter, KEYWORDS},
    Analyzer, Schema,
};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};
use tracing_subscriber::EnvFilter;
use unicode_width::UnicodeWidthStr;

#[derive(Parser, Debug)]
struct Args {
    /// JSON file declaring the columns of tables
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Read/process named file
    #[arg(long)]
    init: Option<PathBuf>,

    /// Align grouping and ordering before printing
    #[arg(long)]
    align: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Run SQL and exit
    #[arg(short, long)]
    command: Option<String>,

    /// Log filter, overriding RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let filter = match &args.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .without_time()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let schema: Schema = match &args.schema {
        Some(path) => {
            let schema: Schema = serde_json::from_reader(BufReader::new(File::open(path)?))?;
            tracing::info!(path = %path.display(), tables = schema.tables.len(), "loaded schema");
            schema
        }
        None => Schema::new(),
    };
    let mut repl = Repl::new(Analyzer::new(schema), args.align, args.format)?;
    if let Some(init) = args.init {
        repl.process_file(init)?;
    }
    if let Some(command) = args.command {
        repl.buf = command;
        repl.run_sql(false)?;
        return Ok(());
    }
    repl.run()
}

struct Repl {
    rl: Editor<RustylineHelper, rustyline::history::DefaultHistory>,
    analyzer: Analyzer,
    align: bool,
    format: Format,
    buf: String,
}

impl Repl {
    fn new(analyzer: Analyzer, align: bool, format: Format) -> Result<Self> {
        let mut rl = Editor::new()?;
        rl.set_helper(Some(RustylineHelper::new(analyzer.schema())));
        Ok(Self {
            rl,
            analyzer,
            align,
            format,
            buf: String::new(),
        })
    }

    fn run(mut self) -> Result<()> {
        loop {
            let prompt = if self.buf.is_empty() { "> " } else { ". " };
            let line = match self.rl.readline(prompt) {
                Ok(line) => line,
                Err(ReadlineError::Eof) => break,
                Err(ReadlineError::Interrupted) => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            self.run_line(&line)?;
        }
        self.run_sql(false)?; // Finish any incomplete statement
        Ok(())
    }

    fn process_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        for line in reader.lines() {
            self.run_line(&line?)?;
        }
        self.run_sql(false)?; // Finish any incomplete statement
        self.buf.clear();
        Ok(())
    }

    fn run_line(&mut self, line: &str) -> Result<()> {
        let trimmed_line = line.trim();
        if self.buf.is_empty() {
            if trimmed_line.is_empty() {
                return Ok(());
            }
            if line.starts_with('.') {
                self.rl.add_history_entry(line)?;
                if let Err(e) = self.run_metacommand(trimmed_line) {
                    eprintln!("{e}");
                }
                return Ok(());
            }
        }
        self.buf.push_str(line);
        if !trimmed_line.ends_with(';') {
            self.buf.push('\n');
            return Ok(());
        }
        if self.run_sql(true)? {
            self.rl.add_history_entry(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }

    fn run_metacommand(&mut self, line: &str) -> Result<()> {
        let parts = std::iter::once(">").chain(line.split_ascii_whitespace());
        let metacommand = Metacommand::try_parse_from(parts)?;
        match metacommand {
            Metacommand::Read { filename } => self.process_file(filename)?,
            Metacommand::Table { name, columns } => {
                tracing::debug!(%name, columns = columns.len(), "declared table");
                self.analyzer.schema_mut().add_table(name, columns);
                if let Some(helper) = self.rl.helper_mut() {
                    *helper = RustylineHelper::new(self.analyzer.schema());
                }
            }
            Metacommand::Schema => {
                println!("{}", serde_json::to_string_pretty(self.analyzer.schema())?);
            }
            Metacommand::Align { state } => self.align = matches!(state, Toggle::On),
        }
        Ok(())
    }

    fn run_sql(&self, repl: bool) -> Result<bool> {
        let segmenter = Segmenter::new(&self.buf);
        let mut statements = Vec::new();
        let mut current_statement = String::new();
        for segment in segmenter {
            match segment {
                Ok(segment) => {
                    match segment.kind() {
                        SegmentKind::Operator if segment.slice() == ";" => {
                            // This semicolon finishes a statement.
                            statements.push(std::mem::take(&mut current_statement));
                        }
                        _ => current_statement.push_str(segment.slice()),
                    }
                }
                Err((e, remaining)) => {
                    if repl && matches!(e, LexerError::UnexpectedEof) {
                        return Ok(false);
                    }
                    // Let the analyzer report the error.
                    current_statement.push_str(remaining);
                    break;
                }
            }
        }
        statements.push(current_statement);
        for statement in statements {
            match self.analyzer.analyze(&statement) {
                Ok(projection) => self.print(&projection.summary(self.align))?,
                Err(shardgate::Error::NoStatement) => (),
                Err(e) if repl => {
                    eprintln!("{e}");
                    return Ok(true);
                }
                Err(e) => eprintln!("{e}"),
            }
        }
        Ok(true)
    }

    fn print(&self, summary: &shardgate::ProjectionSummary) -> Result<()> {
        let mut out = std::io::stdout().lock();
        match self.format {
            Format::Text => write_table(&mut out, &["property", "value"], summary.rows())?,
            Format::Json => {
                serde_json::to_writer_pretty(&mut out, summary)?;
                std::io::Write::write_all(&mut out, b"\n")?;
            }
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
enum Metacommand {
    /// Read input from FILENAME
    #[clap(name = ".read")]
    Read { filename: PathBuf },

    /// Declare the columns of table NAME
    #[clap(name = ".table")]
    Table {
        name: String,
        #[arg(required = true)]
        columns: Vec<String>,
    },

    /// Print the declared tables as JSON
    #[clap(name = ".schema")]
    Schema,

    /// Turn alignment of grouping and ordering on or off
    #[clap(name = ".align")]
    Align {
        #[arg(value_enum)]
        state: Toggle,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Toggle {
    On,
    Off,
}

fn write_table<W: std::io::Write>(
    out: &mut W,
    header: &[&str],
    rows: Vec<(String, String)>,
) -> std::io::Result<()> {
    const COLUMN_SPACING: usize = 2;

    let mut widths: Vec<_> = header.iter().map(|name| name.width()).collect();
    let rows: Vec<[String; 2]> = rows
        .into_iter()
        .map(|(property, value)| [property, value])
        .collect();
    for row in &rows {
        for (formatted, width) in row.iter().zip(widths.iter_mut()) {
            *width = (*width).max(formatted.width());
        }
    }
    for (i, (name, width)) in header.iter().zip(&widths).enumerate() {
        out.write_all(name.as_bytes())?;
        if i == widths.len() - 1 {
            continue;
        }
        for _ in name.width()..*width + COLUMN_SPACING {
            out.write_all(b" ")?;
        }
    }
    out.write_all(b"\n")?;
    for (i, width) in widths.iter().enumerate() {
        for _ in 0..*width {
            out.write_all(b"-")?;
        }
        if i == widths.len() - 1 {
            continue;
        }
        for _ in 0..COLUMN_SPACING {
            out.write_all(b" ")?;
        }
    }
    out.write_all(b"\n")?;
    for row in rows {
        for (i, (formatted, width)) in row.iter().zip(&widths).enumerate() {
            out.write_all(formatted.as_bytes())?;
            if i == widths.len() - 1 {
                continue;
            }
            for _ in formatted.width()..*width + COLUMN_SPACING {
                out.write_all(b" ")?;
            }
        }
        out.write_all(b"\n")?;
    }
    Ok(())
}

struct RustylineHelper {
    /// Table and column names to complete.
    names: Vec<String>,
}

impl RustylineHelper {
    fn new(schema: &Schema) -> Self {
        let mut names: Vec<_> = schema
            .tables
            .iter()
            .flat_map(|(table, columns)| std::iter::once(table).chain(columns))
            .cloned()
            .collect();
        names.sort_unstable();
        names.dedup();
        Self { names }
    }
}

impl Helper for RustylineHelper {}

impl Completer for RustylineHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let (start, word) = extract_word(line, pos, None, |ch| !is_valid_identifier_char(ch));
        let uppercase_word = word.to_ascii_uppercase();
        let mut candidates: Vec<_> = KEYWORDS
            .iter()
            .map(|keyword| keyword.to_ascii_uppercase())
            .filter(|keyword| keyword.starts_with(&uppercase_word))
            .collect();
        candidates.extend(
            self.names
                .iter()
                .filter(|name| name.starts_with(word))
                .cloned(),
        );
        Ok((start, candidates))
    }
}

impl Highlighter for RustylineHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> std::borrow::Cow<'l, str> {
        let mut segmenter = Segmenter::new(line);
        let mut highlighted = String::new();
        for segment in segmenter.by_ref() {
            match segment {
                Ok(segment) => {
                    let color = match segment.kind() {
                        SegmentKind::Literal => {
                            Some("\x1b[33m") // yellow
                        }
                        SegmentKind::Keyword => {
                            Some("\x1b[32m") // green
                        }
                        SegmentKind::Comment => {
                            Some("\x1b[90m") // gray
                        }
                        SegmentKind::Identifier
                        | SegmentKind::Operator
                        | SegmentKind::Whitespace => None,
                    };
                    match color {
                        Some(color) => {
                            highlighted.push_str(color);
                            highlighted.push_str(segment.slice());
                            highlighted.push_str("\x1b[0m");
                        }
                        None => {
                            highlighted.push_str(segment.slice());
                        }
                    }
                }
                Err((_, remaining)) => {
                    highlighted.push_str(remaining);
                    break;
                }
            }
        }
        highlighted.into()
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for RustylineHelper {
    type Hint = String;
}

impl Validator for RustylineHelper {}
