//! Logical rules and placeholder resolution.
//!
//! Rules are the first executable elements to exist while an agent is
//! being assembled, so a rule that calls itself recursively would reference
//! a rule object that does not exist yet. A placeholder entry stands in for
//! the identifier until the full rule set is known; resolution then swaps
//! every placeholder for the real rule in place, exactly once. Invoking a
//! placeholder that survived resolution is a logic error: it fails instead
//! of executing.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::ConfigurationError;
use crate::execution::Execution;
use crate::literal::{Literal, LiteralSignature};
use crate::path::Path;
use crate::term::digest64;
use crate::variable::Variable;

/// A rule: an identifier literal (its call signature) and a body.
pub struct Rule {
    identifier: Literal,
    body: Vec<Execution>,
    template: Vec<Arc<Variable>>,
}

impl Rule {
    /// Creates a rule. The variable scope is derived from the identifier
    /// and every body element.
    #[must_use]
    pub fn new(identifier: Literal, body: Vec<Execution>) -> Self {
        let mut names: BTreeSet<Path> = identifier.variables().map(|v| v.name().clone()).collect();
        for element in &body {
            element.collect_variable_names(&mut names);
        }
        let template = names.into_iter().map(Variable::shared).collect();

        Self {
            identifier,
            body,
            template,
        }
    }

    /// The call-signature literal.
    #[must_use]
    pub const fn identifier(&self) -> &Literal {
        &self.identifier
    }

    /// Body elements, executed in order.
    #[must_use]
    pub fn body(&self) -> &[Execution] {
        &self.body
    }

    /// Fresh unbound cells for one activation, one per scope variable.
    #[must_use]
    pub fn variables(&self) -> Vec<Arc<Variable>> {
        self.template
            .iter()
            .map(|v| v.shallow_copy_shared())
            .collect()
    }

    /// Structural hash of the call signature.
    #[must_use]
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"rule");
        self.identifier.feed(&mut hasher);
        digest64(&hasher)
    }
}

impl Clone for Rule {
    fn clone(&self) -> Self {
        Self::new(self.identifier.clone(), self.body.clone())
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("identifier", &self.identifier.to_string())
            .field("body", &self.body.len())
            .finish()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} :- [{} elements]", self.identifier, self.body.len())
    }
}

/// A library entry: the real rule, or the identifier standing in for it.
#[derive(Debug, Clone)]
pub enum RuleEntry {
    /// Identifier-only stand-in used during construction.
    Placeholder(Literal),
    /// The resolved rule.
    Resolved(Arc<Rule>),
}

impl RuleEntry {
    /// Returns true for placeholders.
    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

/// The rule set of one agent, keyed by identifier signature.
#[derive(Debug, Default, Clone)]
pub struct RuleLibrary {
    rules: HashMap<LiteralSignature, RuleEntry>,
}

impl RuleLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files a placeholder for a rule whose body is not known yet. A
    /// resolved rule under the same signature is left untouched.
    pub fn add_placeholder(&mut self, identifier: Literal) {
        self.rules
            .entry(identifier.signature())
            .or_insert(RuleEntry::Placeholder(identifier));
    }

    /// Files a rule, replacing any placeholder (or older rule) in place.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.insert(
            rule.identifier().signature(),
            RuleEntry::Resolved(Arc::new(rule)),
        );
    }

    /// The one-time fix-up run once the full rule set is known.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::UnresolvedPlaceholder` naming the first
    /// placeholder that never received a body; this aborts the load phase.
    pub fn resolve_placeholders(&self) -> Result<(), ConfigurationError> {
        for entry in self.rules.values() {
            if let RuleEntry::Placeholder(identifier) = entry {
                return Err(ConfigurationError::UnresolvedPlaceholder {
                    rule: identifier.functor().clone(),
                });
            }
        }
        Ok(())
    }

    /// Looks up an entry by signature.
    #[must_use]
    pub fn get(&self, signature: &LiteralSignature) -> Option<&RuleEntry> {
        self.rules.get(signature)
    }

    /// Looks up a resolved rule; placeholders yield `None`.
    #[must_use]
    pub fn resolved(&self, signature: &LiteralSignature) -> Option<Arc<Rule>> {
        match self.rules.get(signature) {
            Some(RuleEntry::Resolved(rule)) => Some(Arc::clone(rule)),
            _ => None,
        }
    }

    /// Number of entries, placeholders included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if the library has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
