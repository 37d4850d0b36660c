//! Variable binding cells.
//!
//! A variable is a named, optionally type-restricted slot that starts free,
//! is bound during unification or assignment, and is unbound again when
//! duplicated into a fresh execution context. The wildcard name `_` matches
//! anything and never participates in uniqueness checks.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{NoemaError, NoemaResult};
use crate::path::Path;
use crate::term::{Term, TermKind};

/// Name of the wildcard variable.
pub const WILDCARD: &str = "_";

/// A variable binding cell.
///
/// Cells are shared (`Arc`) between the literals that mention a variable
/// and the execution context that owns its scope. Binding goes through the
/// cell so every holder observes the same value. A context `duplicate`
/// produces fresh cells via [`Variable::shallow_copy`].
///
/// # Examples
///
/// ```
/// use noema::{Path, Term, Variable};
///
/// let var = Variable::shared(Path::from("X"));
/// assert!(!var.allocated());
/// var.bind(Term::from(3.0)).unwrap();
/// assert_eq!(var.raw().unwrap().as_number().unwrap(), 3.0);
/// ```
#[derive(Debug)]
pub struct Variable {
    name: Path,
    restriction: Option<TermKind>,
    slot: RwLock<Option<Term>>,
}

impl Variable {
    /// Creates a free variable.
    #[must_use]
    pub fn new(name: impl Into<Path>) -> Self {
        Self {
            name: name.into(),
            restriction: None,
            slot: RwLock::new(None),
        }
    }

    /// Creates a free variable restricted to one term kind. Rebinding to
    /// any other kind is rejected with a type-mismatch error.
    #[must_use]
    pub fn with_restriction(name: impl Into<Path>, restriction: TermKind) -> Self {
        Self {
            name: name.into(),
            restriction: Some(restriction),
            slot: RwLock::new(None),
        }
    }

    /// Creates a shared free variable.
    #[must_use]
    pub fn shared(name: impl Into<Path>) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// The fully-qualified variable name.
    #[must_use]
    pub const fn name(&self) -> &Path {
        &self.name
    }

    /// The kind restriction, if any.
    #[must_use]
    pub const fn restriction(&self) -> Option<TermKind> {
        self.restriction
    }

    /// Returns true for the wildcard `_`.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.name.suffix() == Some(WILDCARD)
    }

    /// Returns true if the cell holds a value.
    #[must_use]
    pub fn allocated(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Clones the bound value, if any.
    #[must_use]
    pub fn raw(&self) -> Option<Term> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Binds the cell, replacing any previous value.
    ///
    /// The term is flattened first so that binding to an allocated variable
    /// stores its value rather than a chain of references.
    ///
    /// # Errors
    ///
    /// Returns a type-mismatch error when a kind restriction rejects the
    /// value.
    pub fn bind(&self, term: Term) -> NoemaResult<()> {
        let term = term.flattened();
        if let Some(required) = self.restriction {
            // Unbound variables pass through: the restriction applies to
            // concrete values only.
            if term.kind() != TermKind::Variable && term.kind() != required {
                return Err(NoemaError::type_mismatch(
                    required.name(),
                    term.kind().name(),
                ));
            }
        }
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(term);
        Ok(())
    }

    /// Clears the cell back to the free state.
    pub fn unbind(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// A fresh, unbound cell with the same name and restriction.
    #[must_use]
    pub fn shallow_copy(&self) -> Self {
        Self {
            name: self.name.clone(),
            restriction: self.restriction,
            slot: RwLock::new(None),
        }
    }

    /// A fresh, unbound shared cell with the same name and restriction.
    #[must_use]
    pub fn shallow_copy_shared(&self) -> Arc<Self> {
        Arc::new(self.shallow_copy())
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Variable {}

impl std::hash::Hash for Variable {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raw() {
            Some(value) => write!(f, "{}({value})", self.name),
            None => write!(f, "{}()", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_starts_free() {
        let var = Variable::new(Path::from("X"));
        assert!(!var.allocated());
        assert!(var.raw().is_none());
    }

    #[test]
    fn test_variable_bind_and_unbind() {
        let var = Variable::new(Path::from("X"));
        var.bind(Term::from(1.0)).unwrap();
        assert!(var.allocated());
        assert_eq!(var.raw().unwrap(), Term::from(1.0));

        var.unbind();
        assert!(!var.allocated());
    }

    #[test]
    fn test_variable_rebinding_replaces() {
        let var = Variable::new(Path::from("X"));
        var.bind(Term::from(1.0)).unwrap();
        var.bind(Term::from(2.0)).unwrap();
        assert_eq!(var.raw().unwrap(), Term::from(2.0));
    }

    #[test]
    fn test_variable_restriction_rejects() {
        let var = Variable::with_restriction(Path::from("N"), TermKind::Number);
        assert!(var.bind(Term::from("text")).is_err());
        assert!(!var.allocated());
        assert!(var.bind(Term::from(9.0)).is_ok());
    }

    #[test]
    fn test_variable_bind_flattens() {
        let inner = Variable::shared(Path::from("Y"));
        inner.bind(Term::from(7.0)).unwrap();

        let var = Variable::new(Path::from("X"));
        var.bind(Term::Variable(Arc::clone(&inner))).unwrap();
        assert_eq!(var.raw().unwrap(), Term::from(7.0));
    }

    #[test]
    fn test_wildcard() {
        assert!(Variable::new(Path::from("_")).is_wildcard());
        assert!(!Variable::new(Path::from("X")).is_wildcard());
    }

    #[test]
    fn test_shallow_copy_is_fresh() {
        let var = Variable::with_restriction(Path::from("X"), TermKind::Number);
        var.bind(Term::from(1.0)).unwrap();

        let copy = var.shallow_copy();
        assert_eq!(copy.name(), var.name());
        assert_eq!(copy.restriction(), Some(TermKind::Number));
        assert!(!copy.allocated());

        // Rebinding the copy must not touch the original.
        copy.bind(Term::from(5.0)).unwrap();
        assert_eq!(var.raw().unwrap(), Term::from(1.0));
    }

    #[test]
    fn test_equality_by_name() {
        let a = Variable::new(Path::from("X"));
        let b = Variable::new(Path::from("X"));
        b.bind(Term::from(1.0)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, Variable::new(Path::from("Y")));
    }

    #[test]
    fn test_display() {
        let var = Variable::new(Path::from("X"));
        assert_eq!(format!("{var}"), "X()");
        var.bind(Term::from(2.0)).unwrap();
        assert_eq!(format!("{var}"), "X(2)");
    }
}
