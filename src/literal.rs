//! Literals - named, possibly-negated facts and goals.
//!
//! A literal is a functor path, an ordered argument sequence, an unordered
//! annotation set, a negation flag, and a has-at flag used for trigger
//! decoration. Structural hashing combines functor, arity, negation, and
//! ordered argument hashes; it is invariant to variable binding state and
//! defines equality for plan and trigger matching.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::ConfigurationError;
use crate::path::Path;
use crate::term::{digest64, Term, TermVariables};

/// Functor plus arity: the signature used to index plans, rules, and
/// belief candidates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LiteralSignature {
    /// Functor path.
    pub functor: Path,
    /// Number of positional arguments.
    pub arity: usize,
}

impl fmt::Display for LiteralSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.functor, self.arity)
    }
}

/// A named, possibly-negated fact or goal.
///
/// # Examples
///
/// ```
/// use noema::{Literal, Term};
///
/// let lit = Literal::builder()
///     .functor("env.temperature")
///     .arg(Term::from(21.0))
///     .build()
///     .unwrap();
///
/// assert_eq!(lit.arity(), 1);
/// assert!(!lit.negated());
/// ```
#[derive(Debug, Clone)]
pub struct Literal {
    functor: Path,
    args: Vec<Term>,
    annotations: Vec<Literal>,
    negated: bool,
    has_at: bool,
}

impl Literal {
    /// Creates a plain positive literal.
    #[must_use]
    pub fn new(functor: impl Into<Path>, args: Vec<Term>) -> Self {
        Self {
            functor: functor.into(),
            args,
            annotations: Vec::new(),
            negated: false,
            has_at: false,
        }
    }

    /// Creates a zero-arity literal.
    #[must_use]
    pub fn atom(functor: impl Into<Path>) -> Self {
        Self::new(functor, Vec::new())
    }

    /// Starts a builder.
    #[must_use]
    pub fn builder() -> LiteralBuilder {
        LiteralBuilder::default()
    }

    /// The functor path.
    #[must_use]
    pub const fn functor(&self) -> &Path {
        &self.functor
    }

    /// Ordered positional arguments.
    #[must_use]
    pub fn args(&self) -> &[Term] {
        &self.args
    }

    /// Unordered annotation literals.
    #[must_use]
    pub fn annotations(&self) -> &[Literal] {
        &self.annotations
    }

    /// Number of positional arguments.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Negation flag.
    #[must_use]
    pub const fn negated(&self) -> bool {
        self.negated
    }

    /// Trigger-decoration flag (`@` prefix).
    #[must_use]
    pub const fn has_at(&self) -> bool {
        self.has_at
    }

    /// The functor/arity signature.
    #[must_use]
    pub fn signature(&self) -> LiteralSignature {
        LiteralSignature {
            functor: self.functor.clone(),
            arity: self.args.len(),
        }
    }

    /// Two literals can unify only if functor, arity, and negation flag
    /// all match.
    #[must_use]
    pub fn unify_compatible(&self, other: &Self) -> bool {
        self.functor == other.functor
            && self.args.len() == other.args.len()
            && self.negated == other.negated
    }

    /// Lazy traversal of every variable reachable through arguments and
    /// annotations, including nested literals.
    #[must_use]
    pub fn variables(&self) -> TermVariables<'_> {
        TermVariables::with_roots(
            self.args
                .iter()
                .chain(self.annotations.iter().flat_map(|a| a.args().iter())),
        )
    }

    /// Stable structural hash over functor, arity, negation, and ordered
    /// argument hashes. Binding-invariant: `foo(X)` hashes the same before
    /// and after `X` is bound.
    #[must_use]
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        self.feed(&mut hasher);
        digest64(&hasher)
    }

    pub(crate) fn feed(&self, hasher: &mut blake3::Hasher) {
        hasher.update(self.functor.to_string().as_bytes());
        hasher.update(&(self.args.len() as u64).to_le_bytes());
        hasher.update(&[u8::from(self.negated)]);
        for arg in &self.args {
            arg.feed(hasher);
        }
        // Annotations fold order-insensitively.
        let folded = self
            .annotations
            .iter()
            .map(Literal::structural_hash)
            .fold(0_u64, |acc, h| acc ^ h);
        hasher.update(&folded.to_le_bytes());
    }

    /// A copy with every variable replaced through the resolver (by
    /// fully-qualified name). Unresolved and unbound variables are kept
    /// as-is, so partially-ground copies are legal.
    #[must_use]
    pub fn allocate(&self, resolver: &dyn Fn(&Path) -> Option<Term>) -> Self {
        Self {
            functor: self.functor.clone(),
            args: self.args.iter().map(|t| allocate_term(t, resolver)).collect(),
            annotations: self
                .annotations
                .iter()
                .map(|a| a.allocate(resolver))
                .collect(),
            negated: self.negated,
            has_at: self.has_at,
        }
    }

    /// A copy with every allocated variable collapsed into its bound value.
    #[must_use]
    pub fn flattened(&self) -> Self {
        self.allocate(&|_| None)
    }

    pub(crate) fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "functor": self.functor.to_string(),
            "args": self.args.iter().map(|t| serde_json::to_value(t).unwrap_or(serde_json::Value::Null)).collect::<Vec<_>>(),
            "negated": self.negated,
        })
    }
}

fn allocate_term(term: &Term, resolver: &dyn Fn(&Path) -> Option<Term>) -> Term {
    match term {
        Term::Variable(var) => resolver(var.name())
            .map(|t| t.flattened())
            .or_else(|| var.raw())
            .unwrap_or_else(|| term.clone()),
        Term::Literal(lit) => Term::Literal(Box::new(lit.allocate(resolver))),
        Term::List(items) => Term::List(items.iter().map(|t| allocate_term(t, resolver)).collect()),
        Term::Set(set) => Term::Set(set.iter().map(|t| allocate_term(t, resolver)).collect()),
        other => other.clone(),
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        self.structural_hash() == other.structural_hash()
    }
}

impl Eq for Literal {}

impl std::hash::Hash for Literal {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.structural_hash().hash(state);
    }
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_at {
            write!(f, "@")?;
        }
        if self.negated {
            write!(f, "~")?;
        }
        write!(f, "{}", self.functor)?;
        if !self.args.is_empty() {
            write!(f, "(")?;
            for (idx, arg) in self.args.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ")")?;
        }
        if !self.annotations.is_empty() {
            write!(f, "[")?;
            for (idx, ann) in self.annotations.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{ann}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// Builder for literals.
#[derive(Debug, Default)]
pub struct LiteralBuilder {
    functor: Option<Path>,
    args: Vec<Term>,
    annotations: Vec<Literal>,
    negated: bool,
    has_at: bool,
}

impl LiteralBuilder {
    /// Sets the functor path.
    #[must_use]
    pub fn functor(mut self, functor: impl Into<Path>) -> Self {
        self.functor = Some(functor.into());
        self
    }

    /// Appends one positional argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<Term>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends positional arguments.
    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = Term>) -> Self {
        self.args.extend(args);
        self
    }

    /// Adds an annotation literal, deduplicated structurally.
    #[must_use]
    pub fn annotation(mut self, annotation: Literal) -> Self {
        let hash = annotation.structural_hash();
        if !self
            .annotations
            .iter()
            .any(|a| a.structural_hash() == hash)
        {
            self.annotations.push(annotation);
        }
        self
    }

    /// Sets the negation flag.
    #[must_use]
    pub const fn negated(mut self, negated: bool) -> Self {
        self.negated = negated;
        self
    }

    /// Sets the has-at trigger-decoration flag.
    #[must_use]
    pub const fn has_at(mut self, has_at: bool) -> Self {
        self.has_at = has_at;
        self
    }

    /// Builds the literal.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::EmptyFunctor` when the functor is
    /// missing or empty.
    pub fn build(self) -> Result<Literal, ConfigurationError> {
        let functor = self.functor.ok_or(ConfigurationError::EmptyFunctor)?;
        if functor.is_empty() {
            return Err(ConfigurationError::EmptyFunctor);
        }
        Ok(Literal {
            functor,
            args: self.args,
            annotations: self.annotations,
            negated: self.negated,
            has_at: self.has_at,
        })
    }
}
