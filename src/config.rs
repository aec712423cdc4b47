//! Per-strategy timing configuration.
//!
//! The defaults pace a simulated deployment where link latency is far below
//! the send delays. The randomized strategies stay round-aligned as long as
//! the startup jitter plus link latency remains below the first send delay,
//! and every send delay fits inside the round interval.

use std::time::Duration;

/// Slow-MIS configuration.
#[derive(Debug, Clone, Copy)]
pub struct SlowMisConfig {
    /// Upper bound for the uniform jitter on the first timer.
    pub initial_start_delay: Duration,
    /// Enables the neighbor-discovery startup protocol when set. Leave
    /// `None` when the adjacency is known at construction.
    pub discovery: Option<DiscoveryConfig>,
}

impl Default for SlowMisConfig {
    fn default() -> Self {
        Self {
            initial_start_delay: Duration::from_millis(100),
            discovery: None,
        }
    }
}

/// Slow-MIS neighbor-discovery sub-protocol configuration.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryConfig {
    /// How long to collect announcements before the first decision. Must
    /// exceed the startup jitter bound plus one link delay.
    pub timeout: Duration,
    /// Re-evaluation interval while undecided.
    pub check_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            check_interval: Duration::from_millis(500),
        }
    }
}

/// Fast-MIS configuration.
#[derive(Debug, Clone, Copy)]
pub struct FastMisConfig {
    /// Upper bound for the uniform jitter on the first timer.
    pub initial_start_delay: Duration,
    /// Time between consecutive phase boundaries.
    pub phase_interval: Duration,
    /// Delay from the phase boundary to the priority draw and broadcast.
    pub random_value_send_delay: Duration,
}

impl Default for FastMisConfig {
    fn default() -> Self {
        Self {
            initial_start_delay: Duration::from_millis(100),
            phase_interval: Duration::from_secs(1),
            random_value_send_delay: Duration::from_millis(100),
        }
    }
}

/// Desire-Level configuration.
#[derive(Debug, Clone, Copy)]
pub struct DesireLevelConfig {
    /// Upper bound for the uniform jitter on the first timer.
    pub initial_start_delay: Duration,
    /// Time between consecutive round boundaries.
    pub round_interval: Duration,
    /// Delay from the round boundary to the desire-level broadcast, and
    /// again from that broadcast to the marking step.
    pub desire_level_send_delay: Duration,
}

impl Default for DesireLevelConfig {
    fn default() -> Self {
        Self {
            initial_start_delay: Duration::from_millis(100),
            round_interval: Duration::from_secs(1),
            desire_level_send_delay: Duration::from_millis(150),
        }
    }
}
