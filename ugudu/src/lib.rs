#![deny(missing_docs)]
//! # ugudu — umbrella crate
//!
//! Provides a single import surface for the multi-agent orchestration
//! kernel. Re-exports protocol crates, runtime crates, and the kernel
//! (gateway, persistence, member/team/manager) behind feature flags, plus
//! a `prelude` for the happy path.

#[cfg(feature = "core")]
pub use layer0;
#[cfg(feature = "core")]
pub use ugudu_context;
#[cfg(feature = "hooks")]
pub use ugudu_hooks;
#[cfg(feature = "op-react")]
pub use ugudu_op_react;
#[cfg(feature = "op-single-shot")]
pub use ugudu_op_single_shot;
#[cfg(feature = "orch-kit")]
pub use ugudu_orch_kit;
#[cfg(feature = "orch-local")]
pub use ugudu_orch_local;
#[cfg(feature = "provider-anthropic")]
pub use ugudu_provider_anthropic;
#[cfg(feature = "provider-ollama")]
pub use ugudu_provider_ollama;
#[cfg(feature = "provider-openai")]
pub use ugudu_provider_openai;
#[cfg(feature = "state-fs")]
pub use ugudu_state_fs;
#[cfg(feature = "state-memory")]
pub use ugudu_state_memory;
#[cfg(feature = "core")]
pub use ugudu_tool;
#[cfg(feature = "core")]
pub use ugudu_turn;
#[cfg(feature = "gateway")]
pub use ugudu_gateway;
#[cfg(feature = "persist")]
pub use ugudu_persist;
#[cfg(feature = "persist-memory")]
pub use ugudu_persist_memory;
#[cfg(feature = "persist-sqlite")]
pub use ugudu_persist_sqlite;
#[cfg(feature = "member")]
pub use ugudu_member;
#[cfg(feature = "team")]
pub use ugudu_team;
#[cfg(feature = "manager")]
pub use ugudu_manager;
#[cfg(feature = "spec")]
pub use ugudu_spec;

/// Happy-path imports for composing ugudu systems.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use layer0::{
        AgentId, Content, ContentBlock, Effect, ExitReason, Hook, HookAction, HookContext,
        HookPoint, Operator, OperatorConfig, OperatorInput, OperatorOutput, Scope, SessionId,
        StateReader, StateStore, WorkflowId,
    };

    #[cfg(feature = "hooks")]
    pub use ugudu_hooks::HookRegistry;

    #[cfg(feature = "core")]
    pub use ugudu_tool::{ToolDyn, ToolError, ToolRegistry};

    #[cfg(feature = "core")]
    pub use ugudu_turn::provider::{Provider, ProviderError};

    #[cfg(feature = "op-react")]
    pub use ugudu_op_react::{ReactConfig, ReactOperator};

    #[cfg(feature = "op-single-shot")]
    pub use ugudu_op_single_shot::SingleShotOperator;

    #[cfg(feature = "orch-kit")]
    pub use ugudu_orch_kit::{Kit, OrchestratedRunner};

    #[cfg(feature = "state-memory")]
    pub use ugudu_state_memory::MemoryStore;

    #[cfg(feature = "state-fs")]
    pub use ugudu_state_fs::FsStore;

    #[cfg(feature = "gateway")]
    pub use ugudu_gateway::{Gateway, GatewayConfig, GatewayError, GatewayStats, RateLimitState};

    #[cfg(feature = "persist")]
    pub use ugudu_persist::{PersistError, PersistencePort};

    #[cfg(feature = "persist-memory")]
    pub use ugudu_persist_memory::MemoryPersistence;

    #[cfg(feature = "persist-sqlite")]
    pub use ugudu_persist_sqlite::SqlitePersistence;

    #[cfg(feature = "member")]
    pub use ugudu_member::{Member, MemberConfig, MemberError, MemberStatus};

    #[cfg(feature = "team")]
    pub use ugudu_team::{Team, TeamConfig, TeamError};

    #[cfg(feature = "manager")]
    pub use ugudu_manager::{Manager, ManagerConfig, ManagerError};

    #[cfg(feature = "spec")]
    pub use ugudu_spec::{SpecError, TeamSpec};
}
