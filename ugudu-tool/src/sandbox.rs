//! Role-scoped view over a [`ToolRegistry`] (§6 tool port).
//!
//! A member never sees the full registry: it sees a [`SandboxedView`]
//! that only lists and executes tools belonging to its role's allowed
//! [`ToolCategory`] set. Unknown tool names are filtered out rather than
//! rejected at call time, matching the registry's "only what `List`
//! returned is callable" shape.

use std::collections::HashSet;
use std::sync::Arc;

use ugudu_types::{ToolContext, ToolDefinition, ToolError, ToolOutput};

use crate::registry::ToolRegistry;

/// A grouping of related tools, used to scope what a role can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolCategory {
    /// File reads/writes/edits/listing/search.
    Filesystem,
    /// Arbitrary shell command execution.
    Command,
    /// Git plumbing (status, diff, commit, log, branch).
    Git,
    /// Cross-member communication (asking colleagues, reporting progress).
    Communication,
    /// Task creation/assignment/delegation bookkeeping.
    Planning,
    /// Test execution and bug-report workflow.
    Testing,
    /// Doc/requirement/spec authoring.
    Documentation,
    /// Outbound HTTP.
    Network,
}

/// Category membership for the built-in tool names named in §6. Tools not
/// in this table (custom/MCP-sourced) fall back to [`ToolCategory::Command`]-less
/// visibility: they're only reachable by a role whose allowed set is "all".
#[must_use]
pub fn category_of(tool_name: &str) -> Option<ToolCategory> {
    use ToolCategory::{Command, Communication, Documentation, Filesystem, Git, Network, Planning, Testing};
    Some(match tool_name {
        "read_file" | "write_file" | "edit_file" | "list_files" | "search_files" => Filesystem,
        "run_command" => Command,
        "git_status" | "git_diff" | "git_commit" | "git_log" | "git_branch" => Git,
        "ask_colleague" | "report_progress" => Communication,
        "create_task" | "update_task" | "list_tasks" | "assign_task" | "delegate_task" => Planning,
        "run_tests" | "create_bug_report" | "verify_fix" | "list_test_results" => Testing,
        "create_doc" | "create_requirement" | "create_spec" => Documentation,
        "http_request" => Network,
        _ => return None,
    })
}

/// The set of categories a role title is granted, per §6's role→category
/// mapping. Unrecognized role titles fall back to `default`, which grants
/// every category.
#[must_use]
pub fn categories_for_role(role_title: &str) -> Option<HashSet<ToolCategory>> {
    use ToolCategory::{Command, Communication, Documentation, Filesystem, Git, Planning, Testing};
    match role_title {
        "engineer" => Some(HashSet::from([Filesystem, Command, Git, Communication])),
        "pm" => Some(HashSet::from([Planning, Communication])),
        "qa" => Some(HashSet::from([Testing, Command, Communication])),
        "ba" => Some(HashSet::from([Documentation, Communication])),
        _ => None,
    }
}

/// What names a [`SandboxedView`] grants, independent of how it was built.
#[derive(Clone)]
enum Allowance {
    /// Derived from a role's category set; `None` grants everything.
    Categories(Option<HashSet<ToolCategory>>),
    /// An explicit tool-name allowlist, overriding category membership.
    Explicit(HashSet<String>),
}

/// A view over a [`ToolRegistry`] scoped to the categories a role is
/// allowed to reach.
///
/// `None` from [`categories_for_role`] (the `default` case) grants every
/// category, matching "default→all categories". Holds the registry by
/// `Arc` so a view can be handed to a long-lived, independently spawned
/// owner (a member's event loop) rather than borrowing from it.
#[derive(Clone)]
pub struct SandboxedView {
    registry: Arc<ToolRegistry>,
    allowed: Allowance,
}

impl SandboxedView {
    /// Build a view scoped to `role_title`'s allowed categories.
    #[must_use]
    pub fn for_role(registry: Arc<ToolRegistry>, role_title: &str) -> Self {
        Self { registry, allowed: Allowance::Categories(categories_for_role(role_title)) }
    }

    /// Build a view scoped to `role_title`'s allowed categories, unless
    /// `explicit_tools` is non-empty, in which case it entirely overrides
    /// the category mapping (§6: "Empty means derive from role category").
    #[must_use]
    pub fn for_role_with_tools(registry: Arc<ToolRegistry>, role_title: &str, explicit_tools: &[String]) -> Self {
        if explicit_tools.is_empty() {
            Self::for_role(registry, role_title)
        } else {
            Self { registry, allowed: Allowance::Explicit(explicit_tools.iter().cloned().collect()) }
        }
    }

    fn visible(&self, name: &str) -> bool {
        match &self.allowed {
            Allowance::Categories(None) => true,
            Allowance::Categories(Some(allowed)) => match category_of(name) {
                Some(category) => allowed.contains(&category),
                None => false,
            },
            Allowance::Explicit(names) => names.contains(name),
        }
    }

    /// Definitions for tools visible to this role.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry
            .definitions()
            .into_iter()
            .filter(|d| self.visible(&d.name))
            .collect()
    }

    /// Execute a tool by name, scoped to this role's sandbox.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] if `name` isn't visible to this
    /// role (whether or not it exists in the underlying registry) or
    /// isn't registered at all. Otherwise propagates the registry's error.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        if !self.visible(name) {
            return Err(ToolError::NotFound(name.to_string()));
        }
        self.registry.execute(name, input, ctx).await
    }
}
