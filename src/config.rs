//! Process-wide runtime configuration.
//!
//! One immutable value constructed at startup and passed by reference into
//! every agent; there is no ambient global state.

use std::time::Duration;

use serde::Serialize;

use crate::fuzzy::Defuzzifier;

/// Immutable knobs of the reasoning runtime.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeConfig {
    /// Crisp cutoff applied when an aggregated fuzzy value crosses back
    /// into the reasoning cycle.
    pub defuzzification_threshold: f64,

    /// How often a waiting barrier re-evaluates its condition.
    #[serde(skip)]
    pub barrier_poll_interval: Duration,

    /// Capacity of the pending-trigger queue; enqueues beyond it are
    /// dropped and counted.
    pub trigger_queue_capacity: usize,

    /// Upper bound on threads raced per parallel unification round.
    pub parallel_fanout: usize,
}

impl RuntimeConfig {
    /// The defuzzifier derived from the configured threshold.
    #[must_use]
    pub fn defuzzifier(&self) -> Defuzzifier {
        Defuzzifier::new(self.defuzzification_threshold).unwrap_or_default()
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            defuzzification_threshold: 0.5,
            barrier_poll_interval: Duration::from_millis(5),
            trigger_queue_capacity: 1024,
            parallel_fanout: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzzy::FuzzyValue;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.defuzzification_threshold, 0.5);
        assert!(config.trigger_queue_capacity > 0);
        assert!(config.parallel_fanout > 0);
    }

    #[test]
    fn test_defuzzifier_uses_threshold() {
        let config = RuntimeConfig {
            defuzzification_threshold: 0.9,
            ..RuntimeConfig::default()
        };
        let d = config.defuzzifier();
        assert!(!d.crisp(FuzzyValue::new(true, 0.8).unwrap()));
        assert!(d.crisp(FuzzyValue::new(true, 0.95).unwrap()));
    }

    #[test]
    fn test_invalid_threshold_falls_back() {
        let config = RuntimeConfig {
            defuzzification_threshold: 2.0,
            ..RuntimeConfig::default()
        };
        assert_eq!(config.defuzzifier().threshold(), 0.5);
    }
}
