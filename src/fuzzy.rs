//! Fuzzy values - graded truth with a confidence degree.
//!
//! Every executable unit in noema returns a `FuzzyValue<bool>`: a plain
//! truth value paired with a degree in `[0.0, 1.0]`. Aggregation over plan
//! bodies and candidate searches uses streaming reducers (`FuzzyOperator`)
//! that fold identically over sequential or parallel sources. The reasoning
//! cycle converts an aggregated value back into a crisp decision through a
//! `Defuzzifier` at exactly one boundary.

use serde::Serialize;

use crate::error::ConfigurationError;

/// An immutable (value, degree) pair.
///
/// # Examples
///
/// ```
/// use noema::FuzzyValue;
///
/// let v = FuzzyValue::truth(true);
/// assert!(v.value());
/// assert_eq!(v.degree(), 1.0);
///
/// let weak = FuzzyValue::new(true, 0.3).unwrap();
/// assert_eq!(weak.degree(), 0.3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FuzzyValue<T> {
    value: T,
    degree: f64,
}

impl<T> FuzzyValue<T> {
    /// Minimum valid degree.
    pub const MIN_DEGREE: f64 = 0.0;

    /// Maximum valid degree.
    pub const MAX_DEGREE: f64 = 1.0;

    /// Creates a fuzzy value with full confidence.
    #[must_use]
    pub const fn from_value(value: T) -> Self {
        Self { value, degree: 1.0 }
    }

    /// Creates a fuzzy value with an explicit degree.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DegreeOutOfRange` if the degree is not
    /// inside `[0.0, 1.0]` (NaN included).
    pub fn new(value: T, degree: f64) -> Result<Self, ConfigurationError> {
        if !(Self::MIN_DEGREE..=Self::MAX_DEGREE).contains(&degree) {
            return Err(ConfigurationError::DegreeOutOfRange { value: degree });
        }
        Ok(Self { value, degree })
    }

    /// The wrapped value.
    pub const fn value(&self) -> T
    where
        T: Copy,
    {
        self.value
    }

    /// The confidence degree.
    #[must_use]
    pub const fn degree(&self) -> f64 {
        self.degree
    }
}

impl FuzzyValue<bool> {
    /// Creates a boolean fuzzy value with full confidence.
    #[must_use]
    pub const fn truth(value: bool) -> Self {
        Self { value, degree: 1.0 }
    }

    /// Scales the degree by a weight, saturating into `[0.0, 1.0]`.
    #[must_use]
    pub fn weighted(self, weight: f64) -> Self {
        Self {
            value: self.value,
            degree: (self.degree * weight).clamp(Self::MIN_DEGREE, Self::MAX_DEGREE),
        }
    }
}

impl<T: Copy + std::fmt::Display> std::fmt::Display for FuzzyValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.value, self.degree)
    }
}

/// The mutable accumulator used while an operator folds a source.
///
/// Exists only inside aggregation; `immutable` finalizes it.
#[derive(Debug, Clone)]
pub struct FuzzyAccumulator<T> {
    value: T,
    degree: f64,
}

impl<T> FuzzyAccumulator<T> {
    /// Creates an accumulator seeded with the operator identity.
    #[must_use]
    pub const fn seed(value: T, degree: f64) -> Self {
        Self { value, degree }
    }

    /// Current value.
    pub const fn value(&self) -> T
    where
        T: Copy,
    {
        self.value
    }

    /// Current degree.
    #[must_use]
    pub const fn degree(&self) -> f64 {
        self.degree
    }

    /// Overwrites value and degree.
    pub fn store(&mut self, value: T, degree: f64) {
        self.value = value;
        self.degree = degree;
    }

    /// Finalizes into the immutable form.
    #[must_use]
    pub fn immutable(self) -> FuzzyValue<T> {
        FuzzyValue {
            value: self.value,
            degree: self.degree,
        }
    }
}

/// A commutative streaming reducer over fuzzy values.
///
/// Shaped as supplier, accumulator, combiner, and finisher so that the
/// same operator folds sequential iterators and joins parallel partial
/// results without a separate code path.
pub trait FuzzyOperator<T: Copy>: Send + Sync {
    /// Produces the identity accumulator.
    fn supply(&self) -> FuzzyAccumulator<T>;

    /// Folds one value into an accumulator.
    fn accumulate(&self, acc: &mut FuzzyAccumulator<T>, value: FuzzyValue<T>);

    /// Merges two partial accumulators (parallel join).
    fn combine(&self, acc: &mut FuzzyAccumulator<T>, other: &FuzzyAccumulator<T>);

    /// Finalizes the accumulator.
    fn finish(&self, acc: FuzzyAccumulator<T>) -> FuzzyValue<T> {
        acc.immutable()
    }

    /// Folds an entire source.
    fn collect<I>(&self, values: I) -> FuzzyValue<T>
    where
        I: IntoIterator<Item = FuzzyValue<T>>,
        Self: Sized,
    {
        let mut acc = self.supply();
        for value in values {
            self.accumulate(&mut acc, value);
        }
        self.finish(acc)
    }
}

/// Fuzzy-boolean disjunction: value OR, degree max.
#[derive(Debug, Default, Clone, Copy)]
pub struct Union;

impl FuzzyOperator<bool> for Union {
    fn supply(&self) -> FuzzyAccumulator<bool> {
        FuzzyAccumulator::seed(false, 0.0)
    }

    fn accumulate(&self, acc: &mut FuzzyAccumulator<bool>, value: FuzzyValue<bool>) {
        acc.store(acc.value() || value.value(), acc.degree().max(value.degree()));
    }

    fn combine(&self, acc: &mut FuzzyAccumulator<bool>, other: &FuzzyAccumulator<bool>) {
        acc.store(acc.value() || other.value(), acc.degree().max(other.degree()));
    }
}

/// Fuzzy-boolean conjunction: value AND, degree min.
#[derive(Debug, Default, Clone, Copy)]
pub struct Intersection;

impl FuzzyOperator<bool> for Intersection {
    fn supply(&self) -> FuzzyAccumulator<bool> {
        FuzzyAccumulator::seed(true, 1.0)
    }

    fn accumulate(&self, acc: &mut FuzzyAccumulator<bool>, value: FuzzyValue<bool>) {
        acc.store(acc.value() && value.value(), acc.degree().min(value.degree()));
    }

    fn combine(&self, acc: &mut FuzzyAccumulator<bool>, other: &FuzzyAccumulator<bool>) {
        acc.store(acc.value() && other.value(), acc.degree().min(other.degree()));
    }
}

/// Converts an aggregated fuzzy value into a crisp boolean decision.
///
/// The default threshold sits at the complement boundary of the
/// union/intersection operator pair.
#[derive(Debug, Clone, Copy)]
pub struct Defuzzifier {
    threshold: f64,
}

impl Defuzzifier {
    /// Creates a defuzzifier with an explicit threshold.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DegreeOutOfRange` for thresholds outside
    /// `[0.0, 1.0]`.
    pub fn new(threshold: f64) -> Result<Self, ConfigurationError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigurationError::DegreeOutOfRange { value: threshold });
        }
        Ok(Self { threshold })
    }

    /// The crisp cutoff.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// A value defuzzifies to true iff it is true with degree at or above
    /// the threshold.
    #[must_use]
    pub fn crisp(&self, value: FuzzyValue<bool>) -> bool {
        value.value() && value.degree() >= self.threshold
    }
}

impl Default for Defuzzifier {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}
