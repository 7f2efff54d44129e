//! The validated, in-memory shape of a team specification.

use std::collections::HashMap;

/// Whether a role's members may produce messages the external caller sees
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Members of this role may respond directly to the client.
    Client,
    /// Members of this role are only ever reached via delegation.
    Internal,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::Internal
    }
}

/// Per-role model configuration.
#[derive(Debug, Clone, Default)]
pub struct ModelConfig {
    /// Name of the provider this role's model calls go through (must match
    /// a key in whatever provider registry the caller wires up).
    pub provider: String,
    /// The model identifier, in provider-specific form.
    pub model: String,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Explicit max-tokens override, honoured only in normal token mode.
    pub max_tokens: Option<u32>,
    /// Cheaper model substituted in low/minimal token mode, if set.
    pub low_token_model: Option<String>,
    /// Fallback models tried in order if the primary model errors.
    pub fallback: Vec<String>,
}

/// A behavioural template shared by one or more [`crate::TeamSpec`] members.
#[derive(Debug, Clone)]
pub struct Role {
    /// Role name, as keyed in `TeamSpec::roles`.
    pub name: String,
    /// Human-readable title (e.g. "Product Manager").
    pub title: String,
    /// Whether members may respond directly to the client.
    pub visibility: Visibility,
    /// Number of members to instantiate for this role.
    pub count: usize,
    /// Single display name, used when `count == 1`.
    pub display_name: Option<String>,
    /// Per-instance display names, used when `count > 1`.
    pub display_names: Vec<String>,
    /// The role's persona / system-prompt seed.
    pub persona: String,
    /// A condensed persona used in low/minimal token modes. Falls back to
    /// the first line of `persona` if unset.
    pub persona_condensed: Option<String>,
    /// Responsibilities listed in the normal-mode system prompt.
    pub responsibilities: Vec<String>,
    /// Role names this role is permitted to delegate to.
    pub can_delegate: Vec<String>,
    /// Role this role reports to, if any.
    pub reports_to: Option<String>,
    /// Explicit tool name allowlist. Empty means "derive from role
    /// category" (§6 role→category mapping).
    pub tools: Vec<String>,
    /// Model configuration.
    pub model: ModelConfig,
}

impl Role {
    /// The condensed persona to use in low/minimal token mode: the
    /// explicit `persona_condensed` if set, else the first line of
    /// `persona`.
    #[must_use]
    pub fn condensed_persona(&self) -> &str {
        match &self.persona_condensed {
            Some(p) => p,
            None => self.persona.lines().next().unwrap_or(&self.persona),
        }
    }
}

/// Team-wide token-mode settings (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMode {
    /// Full persona, responsibilities, and tool listing; history window 40.
    Normal,
    /// Condensed persona, no responsibilities, history window 10.
    Low,
    /// Condensed persona, no responsibilities, history window 5.
    Minimal,
}

impl Default for TokenMode {
    fn default() -> Self {
        Self::Normal
    }
}

/// `settings.token` from the YAML spec.
#[derive(Debug, Clone, Default)]
pub struct TokenSettings {
    /// The active token mode.
    pub mode: TokenMode,
    /// Explicit max-tokens override (normal mode only).
    pub max_tokens: Option<u32>,
    /// Explicit context-history override, in turns.
    pub context_history: Option<usize>,
}

/// A fully parsed and validated team specification.
#[derive(Debug, Clone)]
pub struct TeamSpec {
    /// `apiVersion`, default `ugudu/v1`.
    pub api_version: String,
    /// `kind`, default `Team`.
    pub kind: String,
    /// `metadata.name`.
    pub name: String,
    /// Role names whose members may respond directly to the client.
    /// Populated from roles with `visibility: client` if left empty in
    /// the source document.
    pub client_facing: Vec<String>,
    /// Roles, keyed by name.
    pub roles: HashMap<String, Role>,
    /// Team-wide token-mode settings.
    pub token_settings: TokenSettings,
}

impl TeamSpec {
    /// Roles in a stable order (alphabetical by name), useful for
    /// deterministic team construction.
    #[must_use]
    pub fn roles_sorted(&self) -> Vec<&Role> {
        let mut roles: Vec<&Role> = self.roles.values().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        roles
    }
}
