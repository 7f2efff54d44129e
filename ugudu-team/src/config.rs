//! Tunables for [`crate::Team`].

use std::time::Duration;

use ugudu_member::MemberConfig;

/// Team-level configuration: channel capacities (§4.2/§5) and the `Ask`
/// aggregator's default timeouts (§4.2 "Ask aggregation").
#[derive(Debug, Clone)]
pub struct TeamConfig {
    /// Capacity of the internal bus all members and the router share
    /// (default 1000).
    pub internal_capacity: usize,
    /// Capacity of the client-bound broadcast channel (default 100).
    pub client_capacity: usize,
    /// Default idle timeout for [`crate::Team::ask`]: the aggregator
    /// closes the response channel after this long without a new
    /// client-bound message (default 30s).
    pub idle_timeout: Duration,
    /// Absolute wall-clock bound on a single `Ask` call, regardless of
    /// idle activity (default 10 minutes).
    pub hard_deadline: Duration,
    /// Config applied to every constructed member.
    pub member: MemberConfig,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            internal_capacity: 1000,
            client_capacity: 100,
            idle_timeout: Duration::from_secs(30),
            hard_deadline: Duration::from_secs(10 * 60),
            member: MemberConfig::default(),
        }
    }
}
