//! Term types - the data model of the reasoning runtime.
//!
//! A term is a tagged union over primitives, opaque host values, variables,
//! nested literals, and ordered/unordered containers. Terms are immutable
//! once constructed; the only mutation path is rebinding a `Variable` cell
//! a term wraps. Structural hashing is stable (blake3), invariant to
//! variable binding state, and defines equality for plan and trigger
//! matching.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::error::{NoemaError, NoemaResult};
use crate::literal::Literal;
use crate::variable::Variable;

/// Discriminant of a term, used for type restrictions and diagnostics.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
    Number,
    Text,
    Boolean,
    Opaque,
    Variable,
    Literal,
    List,
    Set,
}

impl TermKind {
    /// Returns a human-readable kind name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Opaque => "opaque",
            Self::Variable => "variable",
            Self::Literal => "literal",
            Self::List => "list",
            Self::Set => "set",
        }
    }
}

impl fmt::Display for TermKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An externally-typed host value carried through the term graph.
///
/// The payload is shared and never inspected by the core; typed extraction
/// goes through `downcast`. Structural identity is by cell, not by content:
/// two separately-wrapped equal payloads are distinct terms.
#[derive(Clone)]
pub struct OpaqueValue {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl OpaqueValue {
    /// Wraps a host value.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    /// The recorded host type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Attempts a typed borrow of the payload.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    fn cell_address(&self) -> usize {
        Arc::as_ptr(&self.value).cast::<()>() as usize
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueValue<{}>", self.type_name)
    }
}

impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

/// An unordered term container with structural deduplication.
#[derive(Debug, Clone, Default)]
pub struct TermSet {
    items: Vec<Term>,
}

impl TermSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Inserts a term, keeping structural uniqueness. Returns true if the
    /// term was not already present.
    pub fn insert(&mut self, term: Term) -> bool {
        let hash = term.structural_hash();
        if self.items.iter().any(|t| t.structural_hash() == hash) {
            return false;
        }
        self.items.push(term);
        true
    }

    /// Returns true if a structurally equal term is present.
    #[must_use]
    pub fn contains(&self, term: &Term) -> bool {
        let hash = term.structural_hash();
        self.items.iter().any(|t| t.structural_hash() == hash)
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the set has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates elements in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Term> {
        self.items.iter()
    }
}

impl FromIterator<Term> for TermSet {
    fn from_iter<I: IntoIterator<Item = Term>>(iter: I) -> Self {
        let mut set = Self::new();
        for term in iter {
            set.insert(term);
        }
        set
    }
}

/// A term: the atomic unit of literal arguments.
///
/// # Examples
///
/// ```
/// use noema::Term;
///
/// let n = Term::from(21.0);
/// assert_eq!(n.as_number().unwrap(), 21.0);
/// assert!(n.as_text().is_err());
/// ```
#[derive(Debug, Clone)]
pub enum Term {
    /// A numeric value.
    Number(f64),
    /// A text value.
    Text(String),
    /// A boolean value.
    Boolean(bool),
    /// An opaque host value.
    Opaque(OpaqueValue),
    /// A reference to a variable binding cell.
    Variable(Arc<Variable>),
    /// A nested literal.
    Literal(Box<Literal>),
    /// An ordered container.
    List(Vec<Term>),
    /// An unordered, deduplicated container.
    Set(TermSet),
}

impl Term {
    /// The discriminant of this term.
    #[must_use]
    pub const fn kind(&self) -> TermKind {
        match self {
            Self::Number(_) => TermKind::Number,
            Self::Text(_) => TermKind::Text,
            Self::Boolean(_) => TermKind::Boolean,
            Self::Opaque(_) => TermKind::Opaque,
            Self::Variable(_) => TermKind::Variable,
            Self::Literal(_) => TermKind::Literal,
            Self::List(_) => TermKind::List,
            Self::Set(_) => TermKind::Set,
        }
    }

    /// Typed extraction of a number.
    ///
    /// # Errors
    ///
    /// Returns a type-mismatch error for any other kind.
    pub fn as_number(&self) -> NoemaResult<f64> {
        match self.flattened() {
            Self::Number(v) => Ok(v),
            other => Err(NoemaError::type_mismatch("number", other.kind().name())),
        }
    }

    /// Typed extraction of a text value.
    ///
    /// # Errors
    ///
    /// Returns a type-mismatch error for any other kind.
    pub fn as_text(&self) -> NoemaResult<String> {
        match self.flattened() {
            Self::Text(v) => Ok(v),
            other => Err(NoemaError::type_mismatch("text", other.kind().name())),
        }
    }

    /// Typed extraction of a boolean.
    ///
    /// # Errors
    ///
    /// Returns a type-mismatch error for any other kind.
    pub fn as_boolean(&self) -> NoemaResult<bool> {
        match self.flattened() {
            Self::Boolean(v) => Ok(v),
            other => Err(NoemaError::type_mismatch("boolean", other.kind().name())),
        }
    }

    /// Typed borrow of an opaque host value.
    ///
    /// # Errors
    ///
    /// Returns a type-mismatch error if the term is not opaque or the
    /// payload is not a `T`.
    pub fn as_opaque<T: Any + Send + Sync>(&self) -> NoemaResult<Arc<dyn Any + Send + Sync>> {
        match self.flattened() {
            Self::Opaque(v) => {
                if v.value.downcast_ref::<T>().is_some() {
                    Ok(Arc::clone(&v.value))
                } else {
                    Err(NoemaError::type_mismatch(
                        std::any::type_name::<T>(),
                        v.type_name,
                    ))
                }
            }
            other => Err(NoemaError::type_mismatch("opaque", other.kind().name())),
        }
    }

    /// Resolves a variable term to its bound value, transitively. Any other
    /// term, and any unbound variable, is returned as a clone of itself.
    #[must_use]
    pub fn flattened(&self) -> Term {
        match self {
            Self::Variable(var) => match var.raw() {
                Some(inner) => inner.flattened(),
                None => self.clone(),
            },
            other => other.clone(),
        }
    }

    /// Returns true if the term is a variable reference.
    #[must_use]
    pub const fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }

    /// Returns true if no unbound variable occurs anywhere inside.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.variables().all(|v| v.allocated())
    }

    /// Lazy depth-first traversal over every variable cell reachable
    /// through this term, including those inside nested literals and
    /// containers. The iterator is restartable: each call walks afresh.
    #[must_use]
    pub fn variables(&self) -> TermVariables<'_> {
        TermVariables { stack: vec![self] }
    }

    /// Stable structural hash, invariant to variable binding state.
    #[must_use]
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        self.feed(&mut hasher);
        digest64(&hasher)
    }

    pub(crate) fn feed(&self, hasher: &mut blake3::Hasher) {
        match self {
            Self::Number(v) => {
                hasher.update(b"num");
                hasher.update(&v.to_bits().to_le_bytes());
            }
            Self::Text(v) => {
                hasher.update(b"txt");
                hasher.update(v.as_bytes());
            }
            Self::Boolean(v) => {
                hasher.update(b"bool");
                hasher.update(&[u8::from(*v)]);
            }
            Self::Opaque(v) => {
                hasher.update(b"opq");
                hasher.update(v.type_name.as_bytes());
                hasher.update(&v.cell_address().to_le_bytes());
            }
            Self::Variable(v) => {
                // Variables hash by name only: binding state is invisible.
                hasher.update(b"var");
                hasher.update(v.name().to_string().as_bytes());
            }
            Self::Literal(v) => {
                hasher.update(b"lit");
                v.feed(hasher);
            }
            Self::List(items) => {
                hasher.update(b"list");
                hasher.update(&(items.len() as u64).to_le_bytes());
                for item in items {
                    item.feed(hasher);
                }
            }
            Self::Set(set) => {
                // Order-insensitive: fold element hashes with XOR.
                hasher.update(b"set");
                hasher.update(&(set.len() as u64).to_le_bytes());
                let folded = set
                    .iter()
                    .map(Term::structural_hash)
                    .fold(0_u64, |acc, h| acc ^ h);
                hasher.update(&folded.to_le_bytes());
            }
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Number(v) => serde_json::json!(v),
            Self::Text(v) => serde_json::json!(v),
            Self::Boolean(v) => serde_json::json!(v),
            Self::Opaque(v) => serde_json::json!({ "opaque": v.type_name }),
            Self::Variable(v) => serde_json::json!({ "variable": v.name().to_string() }),
            Self::Literal(v) => v.to_json(),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Term::to_json).collect())
            }
            Self::Set(set) => serde_json::json!({
                "set": set.iter().map(Term::to_json).collect::<Vec<_>>()
            }),
        }
    }
}

pub(crate) fn digest64(hasher: &blake3::Hasher) -> u64 {
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Depth-first variable traversal, see [`Term::variables`].
pub struct TermVariables<'a> {
    stack: Vec<&'a Term>,
}

impl<'a> TermVariables<'a> {
    pub(crate) fn with_roots(roots: impl IntoIterator<Item = &'a Term>) -> Self {
        let mut stack: Vec<&'a Term> = roots.into_iter().collect();
        stack.reverse();
        Self { stack }
    }
}

impl<'a> Iterator for TermVariables<'a> {
    type Item = Arc<Variable>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(term) = self.stack.pop() {
            match term {
                Term::Variable(var) => return Some(Arc::clone(var)),
                Term::Literal(literal) => {
                    for ann in literal.annotations().iter().rev() {
                        for arg in ann.args().iter().rev() {
                            self.stack.push(arg);
                        }
                    }
                    for arg in literal.args().iter().rev() {
                        self.stack.push(arg);
                    }
                }
                Term::List(items) => {
                    for item in items.iter().rev() {
                        self.stack.push(item);
                    }
                }
                Term::Set(set) => {
                    let items: Vec<&Term> = set.iter().collect();
                    for item in items.into_iter().rev() {
                        self.stack.push(item);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.structural_hash() == other.structural_hash()
    }
}

impl Eq for Term {}

impl std::hash::Hash for Term {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.structural_hash().hash(state);
    }
}

impl Serialize for Term {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Opaque(v) => write!(f, "<{}>", v.type_name),
            Self::Variable(v) => write!(f, "{v}"),
            Self::Literal(v) => write!(f, "{v}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Set(set) => {
                write!(f, "{{")?;
                for (idx, item) in set.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<f64> for Term {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for Term {
    fn from(v: i64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let value = v as f64;
        Self::Number(value)
    }
}

impl From<i32> for Term {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<bool> for Term {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for Term {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Term {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Literal> for Term {
    fn from(v: Literal) -> Self {
        Self::Literal(Box::new(v))
    }
}

impl From<Arc<Variable>> for Term {
    fn from(v: Arc<Variable>) -> Self {
        Self::Variable(v)
    }
}

impl From<Vec<Term>> for Term {
    fn from(v: Vec<Term>) -> Self {
        Self::List(v)
    }
}

impl From<TermSet> for Term {
    fn from(v: TermSet) -> Self {
        Self::Set(v)
    }
}
