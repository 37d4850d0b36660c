//! Trigger events.
//!
//! A trigger is an event descriptor pairing an event kind (belief
//! added/removed, goal added/removed) with a literal. Triggers are equal
//! iff kind, functor, and arity are equal; argument bindings are resolved
//! through unification during plan selection, never through equality.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::literal::{Literal, LiteralSignature};
use crate::term::digest64;

/// The event kinds that drive plan selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// A literal was added to a belief view (`+`).
    AddBelief,
    /// A literal was removed from a belief view (`-`).
    DeleteBelief,
    /// A goal was raised (`+!`).
    AddGoal,
    /// A goal was dropped (`-!`).
    DeleteGoal,
}

impl TriggerKind {
    /// The textual event prefix.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::AddBelief => "+",
            Self::DeleteBelief => "-",
            Self::AddGoal => "+!",
            Self::DeleteGoal => "-!",
        }
    }

    /// Returns true for belief events.
    #[must_use]
    pub const fn is_belief(self) -> bool {
        matches!(self, Self::AddBelief | Self::DeleteBelief)
    }

    /// Returns true for goal events.
    #[must_use]
    pub const fn is_goal(self) -> bool {
        matches!(self, Self::AddGoal | Self::DeleteGoal)
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Kind plus literal signature: the key plans are filed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TriggerSignature {
    /// Event kind.
    pub kind: TriggerKind,
    /// Literal functor/arity.
    pub literal: LiteralSignature,
}

impl fmt::Display for TriggerSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.literal)
    }
}

/// An immutable event descriptor.
///
/// # Examples
///
/// ```
/// use noema::{Literal, Term, Trigger, TriggerKind};
///
/// let trigger = Trigger::add_belief(Literal::new("temperature", vec![Term::from(21.0)]));
/// assert_eq!(trigger.kind(), TriggerKind::AddBelief);
/// assert_eq!(format!("{trigger}"), "+temperature(21)");
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Trigger {
    kind: TriggerKind,
    literal: Literal,
    created_at: DateTime<Utc>,
}

impl Trigger {
    /// Creates a trigger.
    #[must_use]
    pub fn new(kind: TriggerKind, literal: Literal) -> Self {
        Self {
            kind,
            literal,
            created_at: Utc::now(),
        }
    }

    /// A belief-added event.
    #[must_use]
    pub fn add_belief(literal: Literal) -> Self {
        Self::new(TriggerKind::AddBelief, literal)
    }

    /// A belief-removed event.
    #[must_use]
    pub fn delete_belief(literal: Literal) -> Self {
        Self::new(TriggerKind::DeleteBelief, literal)
    }

    /// A goal-raised event.
    #[must_use]
    pub fn add_goal(literal: Literal) -> Self {
        Self::new(TriggerKind::AddGoal, literal)
    }

    /// A goal-dropped event.
    #[must_use]
    pub fn delete_goal(literal: Literal) -> Self {
        Self::new(TriggerKind::DeleteGoal, literal)
    }

    /// Event kind.
    #[must_use]
    pub const fn kind(&self) -> TriggerKind {
        self.kind
    }

    /// Event literal.
    #[must_use]
    pub const fn literal(&self) -> &Literal {
        &self.literal
    }

    /// Event creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The plan-library key for this event.
    #[must_use]
    pub fn signature(&self) -> TriggerSignature {
        TriggerSignature {
            kind: self.kind,
            literal: self.literal.signature(),
        }
    }

    /// Number of distinct variables inside the event literal.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        let mut names: Vec<String> = self
            .literal
            .variables()
            .map(|v| v.name().to_string())
            .collect();
        names.sort_unstable();
        names.dedup();
        names.len()
    }

    /// A hash over the whole content, argument structure included,
    /// unlike equality which stops at kind/functor/arity.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.kind.symbol().as_bytes());
        self.literal.feed(&mut hasher);
        digest64(&hasher)
    }
}

impl PartialEq for Trigger {
    fn eq(&self, other: &Self) -> bool {
        self.signature() == other.signature()
    }
}

impl Eq for Trigger {}

impl std::hash::Hash for Trigger {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.signature().hash(state);
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.literal)
    }
}
