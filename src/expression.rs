//! Boolean and arithmetic expressions over terms.
//!
//! Expressions appear as plan guards, barrier conditions, and unification
//! constraints. The type is a closed variant tree evaluated by pattern
//! match; there is no expression class hierarchy. Evaluation faults inside
//! a boolean position reduce to fuzzy false and never escape into the
//! reasoning cycle.

use std::fmt;

use serde::Serialize;

use crate::error::{ExecutionError, NoemaError, NoemaResult};
use crate::fuzzy::FuzzyValue;
use crate::path::Path;
use crate::term::Term;

/// Unary expression operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// Boolean negation.
    Not,
}

/// Binary expression operators.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    /// Returns the operator symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Xor => "^",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }
}

/// Resolves a variable name to its bound value.
pub type VariableResolver<'a> = dyn Fn(&Path) -> Option<Term> + 'a;

/// A guard or constraint expression.
///
/// # Examples
///
/// ```
/// use noema::{Expression, Path, Term};
///
/// // X > 5, with X resolved to 8
/// let guard = Expression::gt(Expression::var("X"), Expression::atom(Term::from(5.0)));
/// let result = guard.evaluate_bool(&|name| {
///     (name == &Path::from("X")).then(|| Term::from(8.0))
/// });
/// assert!(result.value());
/// ```
#[derive(Debug, Clone, Serialize)]
pub enum Expression {
    /// A constant term.
    Atom(Term),
    /// A variable reference resolved at evaluation time.
    Var(Path),
    /// A unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        expr: Box<Expression>,
    },
    /// A binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expression>,
        /// Right operand.
        rhs: Box<Expression>,
    },
}

impl Expression {
    /// A constant expression.
    #[must_use]
    pub const fn atom(term: Term) -> Self {
        Self::Atom(term)
    }

    /// A variable reference.
    #[must_use]
    pub fn var(name: impl Into<Path>) -> Self {
        Self::Var(name.into())
    }

    /// Boolean negation.
    #[must_use]
    pub fn not(expr: Self) -> Self {
        Self::Unary {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        }
    }

    /// A binary operation.
    #[must_use]
    pub fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Logical conjunction.
    #[must_use]
    pub fn and(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::And, lhs, rhs)
    }

    /// Logical disjunction.
    #[must_use]
    pub fn or(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Or, lhs, rhs)
    }

    /// Structural equality.
    #[must_use]
    pub fn eq(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Eq, lhs, rhs)
    }

    /// Structural inequality.
    #[must_use]
    pub fn ne(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Ne, lhs, rhs)
    }

    /// Numeric/textual less-than.
    #[must_use]
    pub fn lt(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Lt, lhs, rhs)
    }

    /// Numeric/textual less-or-equal.
    #[must_use]
    pub fn le(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Le, lhs, rhs)
    }

    /// Numeric/textual greater-than.
    #[must_use]
    pub fn gt(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Gt, lhs, rhs)
    }

    /// Numeric/textual greater-or-equal.
    #[must_use]
    pub fn ge(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Ge, lhs, rhs)
    }

    /// A constant truth expression.
    #[must_use]
    pub const fn truth(value: bool) -> Self {
        Self::Atom(Term::Boolean(value))
    }

    /// Evaluates to a term.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch when operand kinds do not fit the operator,
    /// or an execution error when a variable is unresolved.
    pub fn evaluate(&self, resolver: &VariableResolver<'_>) -> NoemaResult<Term> {
        match self {
            Self::Atom(term) => Ok(term.flattened()),
            Self::Var(name) => resolver(name)
                .map(|t| t.flattened())
                .ok_or_else(|| {
                    NoemaError::Execution(ExecutionError::MissingVariable { name: name.clone() })
                }),
            Self::Unary { op, expr } => {
                let value = expr.evaluate(resolver)?;
                match op {
                    UnaryOp::Not => Ok(Term::Boolean(!value.as_boolean()?)),
                }
            }
            Self::Binary { op, lhs, rhs } => {
                let left = lhs.evaluate(resolver)?;
                let right = rhs.evaluate(resolver)?;
                apply_binary(*op, &left, &right)
            }
        }
    }

    /// Evaluates as a boolean position: faults and non-boolean results
    /// collapse into fuzzy false.
    #[must_use]
    pub fn evaluate_bool(&self, resolver: &VariableResolver<'_>) -> FuzzyValue<bool> {
        match self.evaluate(resolver).and_then(|t| t.as_boolean()) {
            Ok(value) => FuzzyValue::truth(value),
            Err(_) => FuzzyValue::truth(false),
        }
    }

    /// Collects every variable name referenced by the expression,
    /// including variables inside embedded terms.
    pub fn collect_variable_names(&self, out: &mut std::collections::BTreeSet<Path>) {
        match self {
            Self::Atom(term) => {
                for var in term.variables() {
                    out.insert(var.name().clone());
                }
            }
            Self::Var(name) => {
                out.insert(name.clone());
            }
            Self::Unary { expr, .. } => expr.collect_variable_names(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_variable_names(out);
                rhs.collect_variable_names(out);
            }
        }
    }
}

fn apply_binary(op: BinaryOp, left: &Term, right: &Term) -> NoemaResult<Term> {
    match op {
        BinaryOp::And => Ok(Term::Boolean(left.as_boolean()? && right.as_boolean()?)),
        BinaryOp::Or => Ok(Term::Boolean(left.as_boolean()? || right.as_boolean()?)),
        BinaryOp::Xor => Ok(Term::Boolean(left.as_boolean()? ^ right.as_boolean()?)),
        BinaryOp::Eq => Ok(Term::Boolean(left == right)),
        BinaryOp::Ne => Ok(Term::Boolean(left != right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(left, right)?;
            Ok(Term::Boolean(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            }))
        }
        BinaryOp::Add => Ok(Term::Number(left.as_number()? + right.as_number()?)),
        BinaryOp::Sub => Ok(Term::Number(left.as_number()? - right.as_number()?)),
        BinaryOp::Mul => Ok(Term::Number(left.as_number()? * right.as_number()?)),
        BinaryOp::Div => Ok(Term::Number(left.as_number()? / right.as_number()?)),
        BinaryOp::Mod => Ok(Term::Number(left.as_number()? % right.as_number()?)),
    }
}

fn compare(left: &Term, right: &Term) -> NoemaResult<std::cmp::Ordering> {
    match (left, right) {
        (Term::Number(a), Term::Number(b)) => a
            .partial_cmp(b)
            .ok_or_else(|| NoemaError::type_mismatch("comparable number", "nan")),
        (Term::Text(a), Term::Text(b)) => Ok(a.cmp(b)),
        (a, b) => Err(NoemaError::type_mismatch(a.kind().name(), b.kind().name())),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(term) => write!(f, "{term}"),
            Self::Var(name) => write!(f, "{name}"),
            Self::Unary { op, expr } => match op {
                UnaryOp::Not => write!(f, "!({expr})"),
            },
            Self::Binary { op, lhs, rhs } => {
                write!(f, "({lhs} {} {rhs})", op.symbol())
            }
        }
    }
}
