use std::fmt;

/// A one- or two-part object name. The dialect defaults the schema to
/// `dbo` when none is written.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct ObjectName {
    pub schema: Option<String>,
    pub base: String,
}

pub const DEFAULT_SCHEMA: &str = "dbo";

impl ObjectName {
    pub fn bare(base: impl Into<String>) -> Self {
        ObjectName {
            schema: None,
            base: base.into(),
        }
    }

    pub fn qualified(schema: impl Into<String>, base: impl Into<String>) -> Self {
        ObjectName {
            schema: Some(schema.into()),
            base: base.into(),
        }
    }

    pub fn schema_or_default(&self) -> &str {
        self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}].[{}]", self.schema_or_default(), self.base)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(val) => write!(f, "{}", val),
            Literal::Float(val) => write!(f, "{}", val),
            Literal::Boolean(val) => write!(f, "{}", if *val { "1" } else { "0" }),
            Literal::String(val) => write!(f, "'{}'", val.replace('\'', "''")),
            Literal::Null => f.write_str("NULL"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Operator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    And,
    Or,
    Not,
    Like,
    In,
    IsNull,
    IsNotNull,
}

impl Operator {
    fn symbol(&self) -> &'static str {
        match self {
            Operator::Addition => "+",
            Operator::Subtraction => "-",
            Operator::Multiplication => "*",
            Operator::Division => "/",
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
            Operator::LessThanEqual => "<=",
            Operator::GreaterThanEqual => ">=",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
            Operator::Like => "LIKE",
            Operator::In => "IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }
}

/// A possibly-qualified column reference. `parts` holds the written
/// segments in order, e.g. `["a", "age"]` or `["dbo", "Employee", "age"]`.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct ColumnRef {
    pub parts: Vec<String>,
}

impl ColumnRef {
    pub fn bare(column: impl Into<String>) -> Self {
        ColumnRef {
            parts: vec![column.into()],
        }
    }

    pub fn two_part(qualifier: impl Into<String>, column: impl Into<String>) -> Self {
        ColumnRef {
            parts: vec![qualifier.into(), column.into()],
        }
    }

    /// The alias or table qualifier directly before the column segment.
    pub fn qualifier(&self) -> Option<&str> {
        if self.parts.len() >= 2 {
            Some(&self.parts[self.parts.len() - 2])
        } else {
            None
        }
    }

    pub fn column(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.parts.iter().map(|p| format!("[{}]", p)).collect();
        f.write_str(&rendered.join("."))
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionCall {
    pub name: ObjectName,
    pub args: Vec<Expression>,
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
        write!(f, "{}({})", self.name, args.join(", "))
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct OperatorApplication {
    pub operator: Operator,
    pub operands: Vec<Expression>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Literal(Literal),
    ColumnRef(ColumnRef),
    /// A procedural-scope parameter such as `@age`.
    Parameter(String),
    FunctionCall(FunctionCall),
    OperatorApplicationExp(OperatorApplication),
}

impl Expression {
    pub fn equals(left: Expression, right: Expression) -> Expression {
        Expression::OperatorApplicationExp(OperatorApplication {
            operator: Operator::Equal,
            operands: vec![left, right],
        })
    }

    pub fn and(left: Expression, right: Expression) -> Expression {
        Expression::OperatorApplicationExp(OperatorApplication {
            operator: Operator::And,
            operands: vec![left, right],
        })
    }

    pub fn or(left: Expression, right: Expression) -> Expression {
        Expression::OperatorApplicationExp(OperatorApplication {
            operator: Operator::Or,
            operands: vec![left, right],
        })
    }

    /// Splits a conjunction into its top-level conjuncts.
    pub fn into_conjuncts(self) -> Vec<Expression> {
        match self {
            Expression::OperatorApplicationExp(op_app) if op_app.operator == Operator::And => {
                op_app
                    .operands
                    .into_iter()
                    .flat_map(|operand| operand.into_conjuncts())
                    .collect()
            }
            other => vec![other],
        }
    }

    /// Rebuilds a conjunction from conjuncts; `None` when empty.
    pub fn from_conjuncts(conjuncts: Vec<Expression>) -> Option<Expression> {
        let mut iter = conjuncts.into_iter();
        let first = iter.next()?;
        Some(iter.fold(first, Expression::and))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(literal) => write!(f, "{}", literal),
            Expression::ColumnRef(column_ref) => write!(f, "{}", column_ref),
            Expression::Parameter(name) => write!(f, "@{}", name),
            Expression::FunctionCall(fc) => write!(f, "{}", fc),
            Expression::OperatorApplicationExp(op_app) => match op_app.operator {
                Operator::Not => write!(f, "NOT ({})", op_app.operands[0]),
                Operator::IsNull | Operator::IsNotNull => {
                    write!(f, "{} {}", op_app.operands[0], op_app.operator.symbol())
                }
                Operator::And | Operator::Or => {
                    let rendered: Vec<String> = op_app
                        .operands
                        .iter()
                        .map(|operand| format!("({})", operand))
                        .collect();
                    f.write_str(&rendered.join(&format!(" {} ", op_app.operator.symbol())))
                }
                _ => {
                    let rendered: Vec<String> =
                        op_app.operands.iter().map(|o| o.to_string()).collect();
                    f.write_str(&rendered.join(&format!(" {} ", op_app.operator.symbol())))
                }
            },
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum SelectItem {
    Star,
    /// `alias.*` — expanded by the planner when the alias names a path.
    QualifiedStar { qualifier: String },
    Expr {
        expression: Expression,
        column_alias: Option<String>,
    },
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

#[derive(Debug, PartialEq, Clone)]
pub struct NamedTableRef {
    pub object: ObjectName,
    pub alias: Option<String>,
}

impl NamedTableRef {
    pub fn exposed_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.object.base)
    }
}

/// A table-valued function reference, e.g. a path-expansion function.
#[derive(Debug, PartialEq, Clone)]
pub struct FunctionTableRef {
    pub call: FunctionCall,
    pub alias: String,
}

#[derive(Debug, PartialEq, Clone)]
pub struct QualifiedJoin {
    pub left: TableReference,
    pub right: TableReference,
    pub kind: JoinKind,
    pub condition: Expression,
}

#[derive(Debug, PartialEq, Clone)]
pub enum TableReference {
    Named(NamedTableRef),
    FunctionTable(FunctionTableRef),
    QualifiedJoin(Box<QualifiedJoin>),
}

impl TableReference {
    /// The alias exposed by the rightmost leaf of this reference.
    pub fn rightmost_alias(&self) -> &str {
        match self {
            TableReference::Named(named) => named.exposed_alias(),
            TableReference::FunctionTable(ft) => &ft.alias,
            TableReference::QualifiedJoin(join) => join.right.rightmost_alias(),
        }
    }
}

/// One edge hop inside a MATCH path:
/// `-[EdgeColumn [AS alias] [*min..max] [{attr: literal, …}]]->`
#[derive(Debug, PartialEq, Clone)]
pub struct EdgePattern {
    pub edge_column: String,
    pub alias: Option<String>,
    pub min_length: u32,
    /// `None` means unbounded.
    pub max_length: Option<u32>,
    pub attributes: Vec<(String, Literal)>,
}

impl EdgePattern {
    pub fn is_single_hop(&self) -> bool {
        self.min_length == 1 && self.max_length == Some(1)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct MatchStep {
    pub node_alias: String,
    pub edge: EdgePattern,
}

/// `a-[e]->b-[f]->c` becomes steps `[(a, e), (b, f)]` with tail `c`.
#[derive(Debug, PartialEq, Clone)]
pub struct MatchPathExpr {
    pub steps: Vec<MatchStep>,
    pub tail_alias: String,
}

impl MatchPathExpr {
    /// The `(source alias, edge, next alias)` triples of this path.
    pub fn triples(&self) -> impl Iterator<Item = (&str, &EdgePattern, &str)> {
        self.steps.iter().enumerate().map(|(index, step)| {
            let next_alias = self
                .steps
                .get(index + 1)
                .map(|next| next.node_alias.as_str())
                .unwrap_or(self.tail_alias.as_str());
            (step.node_alias.as_str(), &step.edge, next_alias)
        })
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct MatchClause {
    pub paths: Vec<MatchPathExpr>,
}

/// One graph-extended SELECT query block. The planner mutates this in
/// place: `match_clause` is consumed, `from_clause` gains the join trees,
/// `where_clause` gains derived predicates.
#[derive(Debug, PartialEq, Clone)]
pub struct SelectQueryBlock {
    pub select_items: Vec<SelectItem>,
    pub from_clause: Vec<TableReference>,
    pub match_clause: Option<MatchClause>,
    pub where_clause: Option<Expression>,
}
