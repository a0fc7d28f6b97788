use super::{fmt_identifier, Expression, Parser, ParserError, ParserResult};
use crate::lexer::Token;

/// A top-level statement, also used for derived tables and subqueries.
#[derive(Debug, Clone)]
pub enum Statement {
    Select(Box<Select>),
    Union(Box<Union>),
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Select(select) => select.fmt(f),
            Self::Union(union) => union.fmt(f),
        }
    }
}

impl Statement {
    /// Returns the left-most SELECT, whose select list names the output
    /// columns of the statement.
    pub fn first_select(&self) -> &Select {
        match self {
            Self::Select(select) => select,
            Self::Union(union) => union.first_select(),
        }
    }

    fn has_modifiers(&self) -> bool {
        let (order_by, limit) = match self {
            Self::Select(select) => (&select.order_by, &select.limit),
            Self::Union(union) => (&union.order_by, &union.limit),
        };
        !order_by.is_empty() || limit.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Select {
    pub distinct: bool,
    pub projections: Vec<SelectItem>,
    pub from: Vec<TableRef>,
    pub where_clause: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub having: Option<Expression>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<Expression>,
    pub offset: Option<Expression>,
}

impl std::fmt::Display for Select {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("select ")?;
        if self.distinct {
            f.write_str("distinct ")?;
        }
        write_comma_separated(f, &self.projections)?;
        if !self.from.is_empty() {
            f.write_str(" from ")?;
            write_comma_separated(f, &self.from)?;
        }
        if let Some(where_clause) = &self.where_clause {
            write!(f, " where {where_clause}")?;
        }
        if !self.group_by.is_empty() {
            f.write_str(" group by ")?;
            write_comma_separated(f, &self.group_by)?;
        }
        if let Some(having) = &self.having {
            write!(f, " having {having}")?;
        }
        write_modifiers(f, &self.order_by, self.limit.as_ref(), self.offset.as_ref())
    }
}

#[derive(Debug, Clone)]
pub struct Union {
    pub left: Statement,
    pub right: Statement,
    pub all: bool,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<Expression>,
    pub offset: Option<Expression>,
}

impl std::fmt::Display for Union {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.left {
            Statement::Select(_) if self.left.has_modifiers() => write!(f, "({})", self.left)?,
            left => left.fmt(f)?,
        }
        f.write_str(if self.all { " union all " } else { " union " })?;
        match &self.right {
            Statement::Select(_) if !self.right.has_modifiers() => self.right.fmt(f)?,
            right => write!(f, "({right})")?,
        }
        write_modifiers(f, &self.order_by, self.limit.as_ref(), self.offset.as_ref())
    }
}

impl Union {
    pub fn first_select(&self) -> &Select {
        self.left.first_select()
    }
}

#[derive(Debug, Clone)]
pub enum SelectItem {
    /// `*` or `t.*`
    Star { table: Option<String> },
    Aliased(AliasedExpr),
}

impl std::fmt::Display for SelectItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Star { table: None } => f.write_str("*"),
            Self::Star { table: Some(table) } => {
                fmt_identifier(f, table)?;
                f.write_str(".*")
            }
            Self::Aliased(aliased) => aliased.fmt(f),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AliasedExpr {
    pub expr: Expression,
    pub alias: Option<String>,
}

impl std::fmt::Display for AliasedExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.expr.fmt(f)?;
        if let Some(alias) = &self.alias {
            f.write_str(" as ")?;
            fmt_identifier(f, alias)?;
        }
        Ok(())
    }
}

impl AliasedExpr {
    pub fn new(expr: Expression) -> Self {
        Self { expr, alias: None }
    }

    /// Whether this item is named `name` by an explicit alias.
    pub fn has_alias(&self, name: &str) -> bool {
        self.alias
            .as_deref()
            .is_some_and(|alias| alias.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone)]
pub enum TableRef {
    Table {
        name: String,
        alias: Option<String>,
    },
    Derived {
        query: Box<Statement>,
        alias: String,
    },
    Join(Box<Join>),
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table { name, alias } => {
                fmt_identifier(f, name)?;
                if let Some(alias) = alias {
                    f.write_str(" as ")?;
                    fmt_identifier(f, alias)?;
                }
                Ok(())
            }
            Self::Derived { query, alias } => {
                write!(f, "({query}) as ")?;
                fmt_identifier(f, alias)
            }
            Self::Join(join) => join.fmt(f),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Join {
    pub left: TableRef,
    pub right: TableRef,
    pub kind: JoinKind,
    pub on: Option<Expression>,
}

impl std::fmt::Display for Join {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.left, self.kind, self.right)?;
        if let Some(on) = &self.on {
            write!(f, " on {on}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl std::fmt::Display for JoinKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Inner => "join",
            Self::Left => "left join",
            Self::Right => "right join",
            Self::Cross => "cross join",
        })
    }
}

#[derive(Debug, Clone)]
pub struct OrderBy {
    pub expr: Expression,
    pub order: Order,
}

impl std::fmt::Display for OrderBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.expr, self.order)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        })
    }
}

fn write_comma_separated<T: std::fmt::Display>(
    f: &mut std::fmt::Formatter<'_>,
    items: &[T],
) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item.fmt(f)?;
    }
    Ok(())
}

fn write_modifiers(
    f: &mut std::fmt::Formatter<'_>,
    order_by: &[OrderBy],
    limit: Option<&Expression>,
    offset: Option<&Expression>,
) -> std::fmt::Result {
    if !order_by.is_empty() {
        f.write_str(" order by ")?;
        write_comma_separated(f, order_by)?;
    }
    if let Some(limit) = limit {
        write!(f, " limit {limit}")?;
    }
    if let Some(offset) = offset {
        write!(f, " offset {offset}")?;
    }
    Ok(())
}

impl Parser<'_> {
    /// Parses a SELECT or a chain of UNIONs, including the trailing
    /// ORDER BY and LIMIT which bind to the whole chain.
    pub(super) fn parse_query(&mut self) -> ParserResult<Statement> {
        let mut query = self.parse_query_term()?;
        while self.lexer.consume_if_eq(Token::Union)? {
            let all = if self.lexer.consume_if_eq(Token::All)? {
                true
            } else {
                self.lexer.consume_if_eq(Token::Distinct)?;
                false
            };
            let right = self.parse_query_term()?;
            query = Statement::Union(Box::new(Union {
                left: query,
                right,
                all,
                order_by: Vec::new(),
                limit: None,
                offset: None,
            }));
        }

        let order_by = (*self.lexer.peek()? == Token::Order)
            .then(|| self.parse_order_by())
            .transpose()?
            .unwrap_or_default();
        let limit = self
            .lexer
            .consume_if_eq(Token::Limit)?
            .then(|| self.parse_expr())
            .transpose()?;
        let offset = self
            .lexer
            .consume_if_eq(Token::Offset)?
            .then(|| self.parse_expr())
            .transpose()?;

        let (target_order_by, target_limit, target_offset) = match &mut query {
            Statement::Select(select) => {
                (&mut select.order_by, &mut select.limit, &mut select.offset)
            }
            Statement::Union(union) => (&mut union.order_by, &mut union.limit, &mut union.offset),
        };
        if !order_by.is_empty() {
            *target_order_by = order_by;
        }
        if limit.is_some() {
            *target_limit = limit;
            *target_offset = offset;
        }
        Ok(query)
    }

    fn parse_query_term(&mut self) -> ParserResult<Statement> {
        if self.lexer.consume_if_eq(Token::LeftParen)? {
            let query = self.parse_query()?;
            self.expect(Token::RightParen)?;
            return Ok(query);
        }
        self.parse_select().map(|select| Statement::Select(Box::new(select)))
    }

    fn parse_select(&mut self) -> ParserResult<Select> {
        self.expect(Token::Select)?;
        let distinct = if self.lexer.consume_if_eq(Token::Distinct)? {
            true
        } else {
            self.lexer.consume_if_eq(Token::All)?;
            false
        };
        let projections = self.parse_comma_separated(Self::parse_projection)?;
        let from = self
            .lexer
            .consume_if_eq(Token::From)?
            .then(|| self.parse_comma_separated(Self::parse_table_ref))
            .transpose()?
            .unwrap_or_default();
        let where_clause = self
            .lexer
            .consume_if_eq(Token::Where)?
            .then(|| self.parse_expr())
            .transpose()?;
        let mut group_by = Vec::new();
        if self.lexer.consume_if_eq(Token::Group)? {
            self.expect(Token::By)?;
            group_by = self.parse_comma_separated(Self::parse_expr)?;
        }
        let having = self
            .lexer
            .consume_if_eq(Token::Having)?
            .then(|| self.parse_expr())
            .transpose()?;
        Ok(Select {
            distinct,
            projections,
            from,
            where_clause,
            group_by,
            having,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        })
    }

    fn parse_projection(&mut self) -> ParserResult<SelectItem> {
        if self.lexer.consume_if_eq(Token::Asterisk)? {
            return Ok(SelectItem::Star { table: None });
        }
        if matches!(self.lexer.peek()?, Token::Identifier(_))
            && *self.lexer.lookahead(1)? == Token::Dot
            && *self.lexer.lookahead(2)? == Token::Asterisk
        {
            let table = self.expect_identifier()?;
            self.expect(Token::Dot)?;
            self.expect(Token::Asterisk)?;
            return Ok(SelectItem::Star { table: Some(table) });
        }
        let expr = self.parse_expr()?;
        let alias = self.parse_alias()?;
        Ok(SelectItem::Aliased(AliasedExpr { expr, alias }))
    }

    fn parse_alias(&mut self) -> ParserResult<Option<String>> {
        match self.lexer.peek()? {
            Token::As => {
                self.lexer.consume()?;
                match self.lexer.consume()? {
                    Token::Identifier(alias) | Token::String(alias) => Ok(Some(alias)),
                    token => Err(ParserError::unexpected(&token)),
                }
            }
            Token::Identifier(_) => Ok(Some(self.expect_identifier()?)),
            _ => Ok(None),
        }
    }

    fn parse_table_ref(&mut self) -> ParserResult<TableRef> {
        let mut table_ref = self.parse_table_factor()?;
        loop {
            let kind = match self.lexer.peek()? {
                Token::Cross => {
                    self.lexer.consume()?;
                    JoinKind::Cross
                }
                Token::Inner => {
                    self.lexer.consume()?;
                    JoinKind::Inner
                }
                Token::Left => {
                    self.lexer.consume()?;
                    self.lexer.consume_if_eq(Token::Outer)?;
                    JoinKind::Left
                }
                Token::Right => {
                    self.lexer.consume()?;
                    self.lexer.consume_if_eq(Token::Outer)?;
                    JoinKind::Right
                }
                Token::Join => JoinKind::Inner,
                _ => return Ok(table_ref),
            };
            self.expect(Token::Join)?;
            let right = self.parse_table_factor()?;
            let on = if kind == JoinKind::Cross {
                None
            } else {
                self.lexer
                    .consume_if_eq(Token::On)?
                    .then(|| self.parse_expr())
                    .transpose()?
            };
            table_ref = TableRef::Join(Box::new(Join {
                left: table_ref,
                right,
                kind,
                on,
            }));
        }
    }

    fn parse_table_factor(&mut self) -> ParserResult<TableRef> {
        match self.lexer.peek()? {
            Token::Identifier(_) => {
                let name = self.expect_identifier()?;
                let alias = self.parse_alias()?;
                Ok(TableRef::Table { name, alias })
            }
            Token::LeftParen => {
                self.lexer.consume()?;
                if matches!(self.lexer.peek()?, Token::Select | Token::LeftParen) {
                    let query = self.parse_query()?;
                    self.expect(Token::RightParen)?;
                    let alias = self
                        .parse_alias()?
                        .ok_or(ParserError::DerivedTableWithoutAlias)?;
                    return Ok(TableRef::Derived {
                        query: Box::new(query),
                        alias,
                    });
                }
                let inner = self.parse_table_ref()?;
                self.expect(Token::RightParen)?;
                Ok(inner)
            }
            token => Err(ParserError::unexpected(token)),
        }
    }

    fn parse_order_by(&mut self) -> ParserResult<Vec<OrderBy>> {
        self.expect(Token::Order)?;
        self.expect(Token::By)?;
        self.parse_comma_separated(|parser| {
            let expr = parser.parse_expr()?;
            let order = if parser.lexer.consume_if_eq(Token::Asc)? {
                Order::Asc
            } else if parser.lexer.consume_if_eq(Token::Desc)? {
                Order::Desc
            } else {
                Order::default()
            };
            Ok(OrderBy { expr, order })
        })
    }
}
