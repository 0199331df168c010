//! Stack sizing and relaunch policy.

use crate::error::StackError;

/// Default number of records in a freshly built store.
pub const DEFAULT_CAPACITY: usize = 65_536;

/// Upper bound a store may grow to unless configured otherwise.
pub const DEFAULT_MAX_CAPACITY: usize = 1 << 28;

/// Multiplier applied to the capacity on each growth step.
pub const DEFAULT_GROWTH_FACTOR: usize = 2;

/// How many times the launch driver re-runs failed tracks before giving up.
pub const DEFAULT_MAX_RELAUNCHES: u32 = 8;

/// Configuration for a [`StackAllocatorStore`](crate::StackAllocatorStore)
/// and the grow-and-rerun policy of [`run_with_growth`](crate::launch::run_with_growth).
///
/// Checked by [`validate`](Self::validate) when a store is built from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackConfig {
    /// Initial number of records.
    pub capacity: usize,

    /// Largest capacity growth may reach.
    pub max_capacity: usize,

    /// Capacity multiplier per growth step. Must be at least 2.
    pub growth_factor: usize,

    /// Relaunch budget for a single run.
    pub max_relaunches: u32,
}

impl StackConfig {
    /// Config with the given initial capacity and default policy.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            max_capacity: DEFAULT_MAX_CAPACITY.max(capacity),
            growth_factor: DEFAULT_GROWTH_FACTOR,
            max_relaunches: DEFAULT_MAX_RELAUNCHES,
        }
    }

    /// Set the growth ceiling.
    pub fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Set the growth multiplier.
    pub fn with_growth_factor(mut self, growth_factor: usize) -> Self {
        self.growth_factor = growth_factor;
        self
    }

    /// Set the relaunch budget.
    pub fn with_max_relaunches(mut self, max_relaunches: u32) -> Self {
        self.max_relaunches = max_relaunches;
        self
    }

    /// Reject configurations that cannot produce a usable store.
    pub fn validate(&self) -> Result<(), StackError> {
        if self.capacity == 0 {
            return Err(StackError::InvalidConfig {
                reason: "capacity must be non-zero".into(),
            });
        }
        if self.capacity > self.max_capacity {
            return Err(StackError::InvalidConfig {
                reason: format!(
                    "capacity {} exceeds max_capacity {}",
                    self.capacity, self.max_capacity
                ),
            });
        }
        if self.growth_factor < 2 {
            return Err(StackError::InvalidConfig {
                reason: format!("growth_factor must be at least 2, got {}", self.growth_factor),
            });
        }
        Ok(())
    }

    /// Capacity to grow to after a launch whose cursor reached `requested`.
    ///
    /// At least `current * growth_factor`, at least `requested`, never more
    /// than `max_capacity`. Returns `current` when the ceiling is reached.
    pub fn next_capacity(&self, current: usize, requested: usize) -> usize {
        current
            .saturating_mul(self.growth_factor)
            .max(requested)
            .min(self.max_capacity)
            .max(current)
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = StackConfig::default();
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = StackConfig::new(0).validate().unwrap_err();
        assert!(matches!(err, StackError::InvalidConfig { .. }));
    }

    #[test]
    fn test_rejects_capacity_above_ceiling() {
        let config = StackConfig::new(64).with_max_capacity(32);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_small_growth_factor() {
        let config = StackConfig::new(64).with_growth_factor(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_next_capacity() {
        let config = StackConfig::new(8).with_max_capacity(100);
        // Doubling wins when demand is modest.
        assert_eq!(config.next_capacity(8, 10), 16);
        // Demand wins when it is larger than a doubling.
        assert_eq!(config.next_capacity(8, 40), 40);
        // Ceiling.
        assert_eq!(config.next_capacity(64, 500), 100);
        assert_eq!(config.next_capacity(100, 500), 100);
    }
}
