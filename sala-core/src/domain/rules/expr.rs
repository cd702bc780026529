// sala-core/src/domain/rules/expr.rs
//
// Typed condition/expression trees. Rules are never evaluated as free text:
// the parser turns them into these trees, and `Display` prints them back in a
// canonical form that the dedupe signature relies on.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::domain::dataset::{Dataset, Row, Value};
use crate::domain::numeric::{self, format_number};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul | Self::Div => 2,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::NotEq => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::LtEq => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::GtEq => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Aggregate {
    Mean,
    Median,
}

impl Aggregate {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "mean" | "avg" => Some(Self::Mean),
            "median" => Some(Self::Median),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
        }
    }

    /// Evaluates the aggregate over the numeric cells of `field`.
    pub fn compute(&self, dataset: &Dataset, field: &str) -> Value {
        let values = dataset.numeric_values(field);
        let result = match self {
            Self::Mean => numeric::mean(&values),
            Self::Median => numeric::median(&values),
        };
        result.map_or(Value::Null, Value::Number)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Field(String),
    Aggregate { func: Aggregate, field: String },
    Neg(Box<Expr>),
    Arith {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Const(bool),
    IsNull { expr: Expr, negated: bool },
    Compare { op: CmpOp, left: Expr, right: Expr },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

/// Precomputed aggregate values, keyed by their canonical text (`mean(price)`).
pub type Aggregates = BTreeMap<String, Value>;

/// What an expression can see while evaluating one row.
pub struct Scope<'a> {
    pub row: &'a Row,
    pub aggregates: &'a Aggregates,
}

impl Expr {
    pub fn eval(&self, scope: &Scope<'_>) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Field(name) => scope.row.get(name).cloned().unwrap_or_default(),
            Expr::Aggregate { .. } => scope
                .aggregates
                .get(&self.to_string())
                .cloned()
                .unwrap_or_default(),
            Expr::Neg(inner) => inner
                .eval(scope)
                .as_number()
                .map_or(Value::Null, |n| Value::number(-n)),
            Expr::Arith { op, left, right } => {
                let (Some(l), Some(r)) = (left.eval(scope).as_number(), right.eval(scope).as_number())
                else {
                    return Value::Null;
                };
                match op {
                    ArithOp::Add => Value::number(l + r),
                    ArithOp::Sub => Value::number(l - r),
                    ArithOp::Mul => Value::number(l * r),
                    ArithOp::Div if r == 0.0 => Value::Null,
                    ArithOp::Div => Value::number(l / r),
                }
            }
        }
    }

    /// Row-level field references (aggregate arguments excluded).
    pub fn collect_fields(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Field(name) => {
                out.insert(name.clone());
            }
            Expr::Neg(inner) => inner.collect_fields(out),
            Expr::Arith { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            Expr::Literal(_) | Expr::Aggregate { .. } => {}
        }
    }

    pub fn collect_aggregates(&self, out: &mut Vec<(Aggregate, String)>) {
        match self {
            Expr::Aggregate { func, field } => {
                if !out.iter().any(|(f, c)| f == func && c == field) {
                    out.push((*func, field.clone()));
                }
            }
            Expr::Neg(inner) => inner.collect_aggregates(out),
            Expr::Arith { left, right, .. } => {
                left.collect_aggregates(out);
                right.collect_aggregates(out);
            }
            Expr::Literal(_) | Expr::Field(_) => {}
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Arith { op, .. } => op.precedence(),
            _ => 3,
        }
    }
}

impl Predicate {
    pub fn eval(&self, scope: &Scope<'_>) -> bool {
        match self {
            Predicate::Const(b) => *b,
            Predicate::IsNull { expr, negated } => expr.eval(scope).is_null() != *negated,
            Predicate::Compare { op, left, right } => {
                compare(&left.eval(scope), &right.eval(scope)).is_some_and(|o| op.holds(o))
            }
            Predicate::And(l, r) => l.eval(scope) && r.eval(scope),
            Predicate::Or(l, r) => l.eval(scope) || r.eval(scope),
            Predicate::Not(inner) => !inner.eval(scope),
        }
    }

    pub fn collect_fields(&self, out: &mut BTreeSet<String>) {
        match self {
            Predicate::Const(_) => {}
            Predicate::IsNull { expr, .. } => expr.collect_fields(out),
            Predicate::Compare { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.collect_fields(out);
                r.collect_fields(out);
            }
            Predicate::Not(inner) => inner.collect_fields(out),
        }
    }

    pub fn collect_aggregates(&self, out: &mut Vec<(Aggregate, String)>) {
        match self {
            Predicate::Const(_) => {}
            Predicate::IsNull { expr, .. } => expr.collect_aggregates(out),
            Predicate::Compare { left, right, .. } => {
                left.collect_aggregates(out);
                right.collect_aggregates(out);
            }
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.collect_aggregates(out);
                r.collect_aggregates(out);
            }
            Predicate::Not(inner) => inner.collect_aggregates(out),
        }
    }
}

/// Nulls never compare. Numbers (or numeric text) compare numerically,
/// anything else by its text form.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_null() || right.is_null() {
        return None;
    }
    match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => l.partial_cmp(&r),
        _ => Some(left.to_string().cmp(&right.to_string())),
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => write!(f, "NULL"),
        Value::Bool(true) => write!(f, "TRUE"),
        Value::Bool(false) => write!(f, "FALSE"),
        Value::Number(n) => write!(f, "{}", format_number(*n)),
        Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write_literal(f, v),
            Expr::Field(name) => write!(f, "{}", name),
            Expr::Aggregate { func, field } => write!(f, "{}({})", func.as_str(), field),
            Expr::Neg(inner) => match inner.as_ref() {
                Expr::Arith { .. } | Expr::Neg(_) => write!(f, "-({})", inner),
                _ => write!(f, "-{}", inner),
            },
            Expr::Arith { op, left, right } => {
                let prec = op.precedence();
                if left.precedence() < prec {
                    write!(f, "({})", left)?;
                } else {
                    write!(f, "{}", left)?;
                }
                write!(f, " {} ", op.symbol())?;
                if right.precedence() <= prec {
                    write!(f, "({})", right)
                } else {
                    write!(f, "{}", right)
                }
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Const(true) => write!(f, "TRUE"),
            Predicate::Const(false) => write!(f, "FALSE"),
            Predicate::IsNull { expr, negated } => {
                write!(f, "{} IS {}NULL", expr, if *negated { "NOT " } else { "" })
            }
            Predicate::Compare { op, left, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Predicate::And(l, r) => {
                write_grouped(f, l, matches!(l.as_ref(), Predicate::Or(..)))?;
                write!(f, " AND ")?;
                write_grouped(f, r, matches!(r.as_ref(), Predicate::Or(..) | Predicate::And(..)))
            }
            Predicate::Or(l, r) => {
                write_grouped(f, l, false)?;
                write!(f, " OR ")?;
                write_grouped(f, r, matches!(r.as_ref(), Predicate::Or(..)))
            }
            Predicate::Not(inner) => {
                write!(f, "NOT ")?;
                write_grouped(
                    f,
                    inner,
                    matches!(inner.as_ref(), Predicate::And(..) | Predicate::Or(..)),
                )
            }
        }
    }
}

fn write_grouped(f: &mut fmt::Formatter<'_>, p: &Predicate, grouped: bool) -> fmt::Result {
    if grouped {
        write!(f, "({})", p)
    } else {
        write!(f, "{}", p)
    }
}
