//! Host-side error types.
//!
//! Kernels never see these: an overflowing allocation inside a launch is
//! reported as an empty region (`None`). `StackError` covers what the host
//! orchestrator can act on.

use thiserror::Error;

/// Errors raised by the host store, configuration and launch driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    /// Demand could not be satisfied even at the maximum configured capacity.
    #[error("stack capacity exceeded: requested {requested} records, capacity {capacity}")]
    CapacityExceeded {
        /// Raw cursor value reached by the launch (total records requested).
        requested: usize,
        /// Capacity of the store at the time.
        capacity: usize,
    },

    /// A descriptor with null storage, null cursor or zero capacity.
    #[error("invalid stack descriptor: storage is null or capacity is zero")]
    InvalidDescriptor,

    /// The operating system refused to map backing storage.
    #[error("system memory allocation failed for {bytes} bytes")]
    AllocFailed {
        /// Size of the rejected mapping.
        bytes: usize,
    },

    /// Record types must occupy memory.
    #[error("record type is zero-sized")]
    ZeroSizedRecord,

    /// Rejected configuration value.
    #[error("invalid stack configuration: {reason}")]
    InvalidConfig {
        /// What was wrong.
        reason: String,
    },

    /// `grow` was asked for a capacity that is not larger than the current one.
    #[error("cannot grow stack from {current} to {requested} records")]
    InvalidGrowth {
        /// Capacity before the call.
        current: usize,
        /// Capacity that was asked for.
        requested: usize,
    },

    /// Tracks still failed after the configured number of relaunches.
    #[error("{pending} tracks still failing after {relaunches} relaunches")]
    RelaunchLimit {
        /// Number of relaunches performed.
        relaunches: u32,
        /// Tracks that never completed.
        pending: usize,
    },
}
