//! Lambda streaming - generic iteration over containers.
//!
//! Lambda bodies iterate whatever their source resolves to: term lists and
//! sets stream directly, numeric ranges are generated, and opaque host
//! containers go through a registry of `LambdaStream` implementations keyed
//! by host type name. Streams are lazy, finite, and restartable: every call
//! walks the container afresh.

use std::collections::HashMap;
use std::sync::Arc;

use crate::term::{OpaqueValue, Term};

/// Streams the elements of one opaque host container type.
pub trait LambdaStream: Send + Sync {
    /// The host type name this streamer handles, as recorded by
    /// [`OpaqueValue::type_name`].
    fn type_name(&self) -> &'static str;

    /// Produces the element sequence. Returns `None` when the payload is
    /// not actually of the declared type.
    fn stream<'a>(&self, value: &'a OpaqueValue) -> Option<Box<dyn Iterator<Item = Term> + 'a>>;
}

/// A streamer built from a plain closure over a typed payload.
pub struct FnLambdaStream<T: Send + Sync + 'static> {
    extract: Box<dyn Fn(&T) -> Vec<Term> + Send + Sync>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> FnLambdaStream<T> {
    /// Wraps an element-extraction closure.
    #[must_use]
    pub fn new(extract: impl Fn(&T) -> Vec<Term> + Send + Sync + 'static) -> Self {
        Self {
            extract: Box::new(extract),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: Send + Sync + 'static> LambdaStream for FnLambdaStream<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn stream<'a>(&self, value: &'a OpaqueValue) -> Option<Box<dyn Iterator<Item = Term> + 'a>> {
        let payload = value.downcast::<T>()?;
        Some(Box::new((self.extract)(payload).into_iter()))
    }
}

/// Maps opaque host types to their streamers.
#[derive(Default)]
pub struct LambdaRegistry {
    streams: HashMap<&'static str, Arc<dyn LambdaStream>>,
}

impl LambdaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a streamer under its host type name, replacing any
    /// previous one.
    pub fn register(&mut self, stream: Arc<dyn LambdaStream>) {
        self.streams.insert(stream.type_name(), stream);
    }

    /// Number of registered streamers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Returns true if no streamer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Materializes the elements of a term: lists and sets directly,
    /// opaque containers through their registered streamer. Scalars and
    /// unknown host types yield `None`.
    #[must_use]
    pub fn stream_of(&self, term: &Term) -> Option<Vec<Term>> {
        match term {
            Term::List(items) => Some(items.clone()),
            Term::Set(set) => Some(set.iter().cloned().collect()),
            Term::Opaque(value) => {
                let streamer = self.streams.get(value.type_name())?;
                streamer.stream(value).map(|iter| iter.collect())
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for LambdaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LambdaRegistry")
            .field("types", &self.streams.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Generates the integer range `[from, to)` as number terms.
#[must_use]
pub fn range_stream(from: f64, to: f64) -> Vec<Term> {
    let mut items = Vec::new();
    #[allow(clippy::cast_possible_truncation)]
    let (mut current, end) = (from.floor() as i64, to.floor() as i64);
    while current < end {
        items.push(Term::from(current));
        current += 1;
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_of_list() {
        let registry = LambdaRegistry::new();
        let term = Term::from(vec![Term::from(1.0), Term::from(2.0)]);
        let items = registry.stream_of(&term).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_stream_of_scalar_is_none() {
        let registry = LambdaRegistry::new();
        assert!(registry.stream_of(&Term::from(1.0)).is_none());
    }

    #[test]
    fn test_opaque_container_through_registry() {
        struct Inventory {
            items: Vec<String>,
        }

        let mut registry = LambdaRegistry::new();
        registry.register(Arc::new(FnLambdaStream::<Inventory>::new(|inv| {
            inv.items.iter().map(|s| Term::from(s.as_str())).collect()
        })));

        let term = Term::Opaque(OpaqueValue::new(Inventory {
            items: vec!["a".to_string(), "b".to_string()],
        }));

        let items = registry.stream_of(&term).unwrap();
        assert_eq!(items, vec![Term::from("a"), Term::from("b")]);

        // Restartable: a second stream yields the same elements.
        assert_eq!(registry.stream_of(&term).unwrap().len(), 2);
    }

    #[test]
    fn test_unregistered_opaque_is_none() {
        let registry = LambdaRegistry::new();
        let term = Term::Opaque(OpaqueValue::new(42_u32));
        assert!(registry.stream_of(&term).is_none());
    }

    #[test]
    fn test_range_stream() {
        let items = range_stream(0.0, 3.0);
        assert_eq!(items, vec![Term::from(0), Term::from(1), Term::from(2)]);
        assert!(range_stream(3.0, 3.0).is_empty());
        assert!(range_stream(5.0, 2.0).is_empty());
    }
}
