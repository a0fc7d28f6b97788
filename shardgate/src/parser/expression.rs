use super::{fmt_identifier, Parser, ParserError, ParserResult, Statement};
use crate::lexer::Token;

/// Lower-cased names of the functions that aggregate over rows.
pub const AGGREGATE_FUNCTIONS: &[&str] = &[
    "avg",
    "bit_and",
    "bit_or",
    "bit_xor",
    "count",
    "group_concat",
    "max",
    "min",
    "std",
    "stddev",
    "stddev_pop",
    "stddev_samp",
    "sum",
    "var_pop",
    "var_samp",
    "variance",
];

// No `PartialEq`: expressions are compared structurally by the planner,
// which has its own rules for identifier case.
#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Literal),
    Column(ColumnRef),
    UnaryOp {
        op: UnaryOp,
        expr: Box<Expression>,
    },
    BinaryOp {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Case {
        branches: Vec<CaseBranch>,
        else_branch: Option<Box<Expression>>,
    },
    Function(FunctionCall),
    Subquery(Box<Statement>),
    Exists(Box<Statement>),
    /// A bind argument, `:name`.
    Argument(String),
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(literal) => literal.fmt(f),
            Self::Column(column_ref) => column_ref.fmt(f),
            Self::UnaryOp { op, expr } => match op {
                UnaryOp::Plus | UnaryOp::Minus => {
                    op.fmt(f)?;
                    if matches!(
                        expr.as_ref(),
                        Self::UnaryOp {
                            op: UnaryOp::Plus | UnaryOp::Minus,
                            ..
                        }
                    ) {
                        write!(f, "({expr})")
                    } else {
                        expr.fmt_operand(f, op.precedence())
                    }
                }
                UnaryOp::Not => {
                    f.write_str("not ")?;
                    expr.fmt_operand(f, op.precedence())
                }
                UnaryOp::IsNull | UnaryOp::IsNotNull => {
                    expr.fmt_operand(f, op.precedence() + 1)?;
                    write!(f, " {op}")
                }
            },
            Self::BinaryOp { op, lhs, rhs } => {
                lhs.fmt_operand(f, op.precedence())?;
                write!(f, " {op} ")?;
                rhs.fmt_operand(f, op.precedence() + 1)
            }
            Self::Case {
                branches,
                else_branch,
            } => {
                f.write_str("case")?;
                for branch in branches {
                    write!(f, " {branch}")?;
                }
                if let Some(else_branch) = else_branch {
                    write!(f, " else {else_branch}")?;
                }
                f.write_str(" end")
            }
            Self::Function(function_call) => function_call.fmt(f),
            Self::Subquery(query) => write!(f, "({query})"),
            Self::Exists(query) => write!(f, "exists ({query})"),
            Self::Argument(name) => write!(f, ":{name}"),
        }
    }
}

impl Expression {
    const ATOM_PRECEDENCE: usize = usize::MAX;

    fn precedence(&self) -> usize {
        match self {
            Self::UnaryOp { op, .. } => op.precedence(),
            Self::BinaryOp { op, .. } => op.precedence(),
            _ => Self::ATOM_PRECEDENCE,
        }
    }

    fn fmt_operand(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        min_precedence: usize,
    ) -> std::fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({self})")
        } else {
            std::fmt::Display::fmt(self, f)
        }
    }

    fn unary_op(self, op: UnaryOp) -> Self {
        Self::UnaryOp {
            op,
            expr: self.into(),
        }
    }

    fn binary_op(self, op: BinaryOp, other: Self) -> Self {
        Self::BinaryOp {
            op,
            lhs: self.into(),
            rhs: other.into(),
        }
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self, Self::Literal(Literal::Null))
    }

    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self {
            Self::Column(column_ref) => Some(column_ref),
            _ => None,
        }
    }

    /// Visits `self` and its descendants in pre-order.
    ///
    /// `f` returns whether to descend into the children of the visited
    /// node. An error stops the walk. Subqueries are opaque: the walk does
    /// not enter them.
    pub fn walk<E, F>(&self, f: &mut F) -> Result<(), E>
    where
        F: FnMut(&Self) -> Result<bool, E>,
    {
        if !f(self)? {
            return Ok(());
        }
        match self {
            Self::UnaryOp { expr, .. } => expr.walk(f),
            Self::BinaryOp { lhs, rhs, .. } => {
                lhs.walk(f)?;
                rhs.walk(f)
            }
            Self::Case {
                branches,
                else_branch,
            } => {
                for CaseBranch { condition, result } in branches {
                    condition.walk(f)?;
                    result.walk(f)?;
                }
                if let Some(else_branch) = else_branch {
                    else_branch.walk(f)?;
                }
                Ok(())
            }
            Self::Function(FunctionCall {
                args: FunctionArgs::Expressions(args),
                ..
            }) => {
                for arg in args {
                    arg.walk(f)?;
                }
                Ok(())
            }
            Self::Literal(_)
            | Self::Column(_)
            | Self::Function(_)
            | Self::Subquery(_)
            | Self::Exists(_)
            | Self::Argument(_) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Integer(i64),
    Real(f64),
    String(String),
    Boolean(bool),
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Integer(i) => i.fmt(f),
            Self::Real(r) => write!(f, "{r:?}"),
            Self::String(s) => {
                f.write_str("'")?;
                for ch in s.chars() {
                    if ch == '\'' {
                        f.write_str("'")?;
                    }
                    write!(f, "{ch}")?;
                }
                f.write_str("'")
            }
            Self::Boolean(true) => f.write_str("true"),
            Self::Boolean(false) => f.write_str("false"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnRef {
    pub table_name: Option<String>,
    pub column_name: String,
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(table_name) = &self.table_name {
            fmt_identifier(f, table_name)?;
            f.write_str(".")?;
        }
        fmt_identifier(f, &self.column_name)
    }
}

impl ColumnRef {
    pub fn qualified(table_name: String, column_name: String) -> Self {
        Self {
            table_name: Some(table_name),
            column_name,
        }
    }

    pub fn unqualified(column_name: String) -> Self {
        Self {
            table_name: None,
            column_name,
        }
    }
}

/*
Operator precedence, loosest first:

| 1  | OR                    |
| 2  | AND                   |
| 3  | NOT                   |
| 4  | IS NULL, IS NOT NULL  |
| 5  | = <> < <= > >=        |
| 6  | LIKE                  |
| 8  | + -                   |
| 9  | * / %                 |
| 13 | unary + -             |
 */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    IsNull,
    IsNotNull,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Not => "not",
            Self::IsNull => "is null",
            Self::IsNotNull => "is not null",
        })
    }
}

impl UnaryOp {
    const fn precedence(self) -> usize {
        match self {
            Self::Plus | Self::Minus => 13,
            Self::IsNull | Self::IsNotNull => 4,
            Self::Not => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    And,
    Or,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "like",
            Self::And => "and",
            Self::Or => "or",
        })
    }
}

impl BinaryOp {
    const fn precedence(self) -> usize {
        match self {
            Self::Mul | Self::Div | Self::Mod => 9,
            Self::Add | Self::Sub => 8,
            Self::Like => 6,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => 5,
            Self::And => 2,
            Self::Or => 1,
        }
    }
}

struct InfixOp {
    op: BinaryOp,
    not: bool,
}

#[derive(Debug, Clone)]
pub struct CaseBranch {
    pub condition: Expression,
    pub result: Expression,
}

impl std::fmt::Display for CaseBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "when {} then {}", self.condition, self.result)
    }
}

#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub name: String,
    pub args: FunctionArgs,
    pub distinct: bool,
}

impl std::fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name)?;
        if self.distinct {
            f.write_str("distinct ")?;
        }
        self.args.fmt(f)?;
        f.write_str(")")
    }
}

impl FunctionCall {
    pub fn is_aggregate(&self) -> bool {
        AGGREGATE_FUNCTIONS
            .iter()
            .any(|name| self.name.eq_ignore_ascii_case(name))
    }

    /// Number of arguments, counting `*` as one.
    pub fn arg_count(&self) -> usize {
        match &self.args {
            FunctionArgs::Wildcard => 1,
            FunctionArgs::Expressions(args) => args.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FunctionArgs {
    Wildcard,
    Expressions(Vec<Expression>),
}

impl std::fmt::Display for FunctionArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wildcard => f.write_str("*"),
            Self::Expressions(args) => {
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    arg.fmt(f)?;
                }
                Ok(())
            }
        }
    }
}

impl Parser<'_> {
    pub fn parse_expr(&mut self) -> ParserResult<Expression> {
        self.parse_sub_expr(0)
    }

    fn parse_sub_expr(&mut self, min_precedence: usize) -> ParserResult<Expression> {
        let mut expr = match self.try_parse_prefix_op()? {
            Some(op) => self.parse_sub_expr(op.precedence())?.unary_op(op),
            None => self.parse_atom()?,
        };
        loop {
            if let Some(op) = self.try_parse_postfix_op(min_precedence)? {
                expr = expr.unary_op(op);
                continue;
            }
            let Some(InfixOp { op, not }) = self.try_parse_infix_op(min_precedence)? else {
                break;
            };
            let rhs = self.parse_sub_expr(op.precedence())?;
            expr = expr.binary_op(op, rhs);
            if not {
                expr = expr.unary_op(UnaryOp::Not);
            }
        }
        Ok(expr)
    }

    fn try_parse_prefix_op(&mut self) -> ParserResult<Option<UnaryOp>> {
        let op = match self.lexer.peek()? {
            Token::Plus => UnaryOp::Plus,
            Token::Minus => UnaryOp::Minus,
            Token::Not => UnaryOp::Not,
            _ => return Ok(None),
        };
        self.lexer.consume()?;
        Ok(Some(op))
    }

    fn try_parse_postfix_op(&mut self, min_precedence: usize) -> ParserResult<Option<UnaryOp>> {
        if *self.lexer.peek()? != Token::Is {
            return Ok(None);
        }
        let not = *self.lexer.lookahead(1)? == Token::Not;
        let op = if not {
            UnaryOp::IsNotNull
        } else {
            UnaryOp::IsNull
        };
        if op.precedence() <= min_precedence {
            return Ok(None);
        }
        self.expect(Token::Is)?;
        if not {
            self.expect(Token::Not)?;
        }
        self.expect(Token::Null)?;
        Ok(Some(op))
    }

    fn try_parse_infix_op(&mut self, min_precedence: usize) -> ParserResult<Option<InfixOp>> {
        let not = *self.lexer.peek()? == Token::Not;
        let token = if not {
            self.lexer.lookahead(1)? // Skip NOT
        } else {
            self.lexer.peek()?
        };
        let op = match token {
            Token::Like => BinaryOp::Like,
            token if not => return Err(ParserError::unexpected(token)),
            Token::And => BinaryOp::And,
            Token::Or => BinaryOp::Or,
            Token::Percent => BinaryOp::Mod,
            Token::Asterisk => BinaryOp::Mul,
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Sub,
            Token::Slash => BinaryOp::Div,
            Token::Lt => BinaryOp::Lt,
            Token::Eq => BinaryOp::Eq,
            Token::Gt => BinaryOp::Gt,
            Token::Ne => BinaryOp::Ne,
            Token::Le => BinaryOp::Le,
            Token::Ge => BinaryOp::Ge,
            _ => return Ok(None),
        };
        if op.precedence() <= min_precedence {
            return Ok(None);
        }
        if not {
            self.expect(Token::Not)?;
        }
        self.lexer.consume()?;
        Ok(Some(InfixOp { op, not }))
    }

    fn parse_atom(&mut self) -> ParserResult<Expression> {
        let expr = match self.lexer.consume()? {
            Token::Null => Expression::Literal(Literal::Null),
            Token::IntegerLiteral(i) => Expression::Literal(Literal::Integer(i)),
            Token::RealLiteral(r) => Expression::Literal(Literal::Real(r)),
            Token::True => Expression::Literal(Literal::Boolean(true)),
            Token::False => Expression::Literal(Literal::Boolean(false)),
            Token::String(s) => Expression::Literal(Literal::String(s)),
            Token::Argument(name) => Expression::Argument(name),
            Token::Identifier(ident) => match self.lexer.peek()? {
                Token::LeftParen => {
                    self.lexer.consume()?;
                    let distinct = self.lexer.consume_if_eq(Token::Distinct)?;
                    let args = if self.lexer.consume_if_eq(Token::RightParen)? {
                        FunctionArgs::Expressions(Vec::new())
                    } else if self.lexer.consume_if_eq(Token::Asterisk)? {
                        self.expect(Token::RightParen)?;
                        FunctionArgs::Wildcard
                    } else {
                        let exprs = self.parse_comma_separated(Self::parse_expr)?;
                        self.expect(Token::RightParen)?;
                        FunctionArgs::Expressions(exprs)
                    };
                    Expression::Function(FunctionCall {
                        name: ident,
                        args,
                        distinct,
                    })
                }
                Token::Dot => {
                    self.lexer.consume()?;
                    let column_name = self.expect_identifier()?;
                    Expression::Column(ColumnRef::qualified(ident, column_name))
                }
                _ => Expression::Column(ColumnRef::unqualified(ident)),
            },
            Token::Case => {
                let operand = (*self.lexer.peek()? != Token::When)
                    .then(|| self.parse_expr())
                    .transpose()?;
                let mut branches = Vec::new();
                while self.lexer.consume_if_eq(Token::When)? {
                    let mut condition = self.parse_expr()?;
                    if let Some(operand) = &operand {
                        condition = operand.clone().binary_op(BinaryOp::Eq, condition);
                    }
                    self.expect(Token::Then)?;
                    let result = self.parse_expr()?;
                    branches.push(CaseBranch { condition, result });
                }
                let else_branch = self
                    .lexer
                    .consume_if_eq(Token::Else)?
                    .then(|| self.parse_expr())
                    .transpose()?;
                self.expect(Token::End)?;
                Expression::Case {
                    branches,
                    else_branch: else_branch.map(Box::new),
                }
            }
            Token::Exists => {
                self.expect(Token::LeftParen)?;
                let query = self.parse_query()?;
                self.expect(Token::RightParen)?;
                Expression::Exists(Box::new(query))
            }
            Token::LeftParen => {
                let inner = if *self.lexer.peek()? == Token::Select {
                    Expression::Subquery(Box::new(self.parse_query()?))
                } else {
                    self.parse_expr()?
                };
                self.expect(Token::RightParen)?;
                inner
            }
            token => return Err(ParserError::unexpected(&token)),
        };
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn rendered(sql: &str) -> String {
        Parser::new(sql).parse_expr().unwrap().to_string()
    }

    #[test]
    fn operands_get_parentheses_only_when_needed() {
        assert_eq!(rendered("(a + b) * c"), "(a + b) * c");
        assert_eq!(rendered("a * b + c"), "a * b + c");
        assert_eq!(rendered("(a * b) + c"), "a * b + c");
        assert_eq!(rendered("a - (b - c)"), "a - (b - c)");
        assert_eq!(rendered("a - b - c"), "a - b - c");
        assert_eq!(rendered("(a OR b) AND c"), "(a or b) and c");
        assert_eq!(rendered("-(-a)"), "-(-a)");
        assert_eq!(rendered("sum(x + 1) / 2"), "sum(x + 1) / 2");
    }
}
