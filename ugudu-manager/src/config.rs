//! Tunables for [`crate::Manager`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ugudu_member::DynProvider;
use ugudu_team::TeamConfig;
use ugudu_tool::ToolRegistry;

/// Everything a [`crate::Manager`] needs to construct a team: the
/// provider registry every role's `model.provider` is resolved against,
/// an optional shared tool registry, per-team tunables, and the delay
/// before an auto-started restored team begins processing (§4.3
/// "Restore on startup": "the call returns before per-team context
/// restore completes").
#[derive(Clone)]
pub struct ManagerConfig {
    /// Provider name → chat provider, shared by every team the manager
    /// constructs.
    pub providers: HashMap<String, Arc<dyn DynProvider>>,
    /// Tool registry shared by every team's members, scoped per-role by
    /// [`ugudu_tool::SandboxedView`]. `None` means no tools are available.
    pub tools: Option<Arc<ToolRegistry>>,
    /// Config applied to every team the manager constructs.
    pub team: TeamConfig,
    /// How long `RestoreTeams` waits before starting a team whose
    /// recorded status was `running`.
    pub restore_delay: Duration,
}

impl ManagerConfig {
    /// An empty provider registry with default team tunables — only
    /// useful once providers are added.
    #[must_use]
    pub fn new(providers: HashMap<String, Arc<dyn DynProvider>>) -> Self {
        Self { providers, tools: None, team: TeamConfig::default(), restore_delay: Duration::from_millis(50) }
    }
}
