//! Serde-shaped mirror of the YAML document, before validation.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::SpecError;
use crate::types::{ModelConfig, Role, TeamSpec, TokenMode, TokenSettings, Visibility};

#[derive(Debug, Deserialize)]
pub(crate) struct RawSpec {
    #[serde(default = "default_api_version")]
    api_version: String,
    #[serde(default = "default_kind")]
    kind: String,
    metadata: RawMetadata,
    #[serde(default)]
    client_facing: Vec<String>,
    roles: HashMap<String, RawRole>,
    #[serde(default)]
    settings: RawSettings,
}

fn default_api_version() -> String {
    "ugudu/v1".to_string()
}

fn default_kind() -> String {
    "Team".to_string()
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawRole {
    title: String,
    #[serde(default)]
    visibility: Option<String>,
    #[serde(default = "default_count")]
    count: usize,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    names: Vec<String>,
    persona: String,
    #[serde(default)]
    persona_condensed: Option<String>,
    #[serde(default)]
    responsibilities: Vec<String>,
    #[serde(default)]
    can_delegate: Vec<String>,
    #[serde(default)]
    reports_to: Option<String>,
    #[serde(default)]
    tools: Vec<String>,
    model: RawModel,
}

fn default_count() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct RawModel {
    provider: String,
    model: String,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    low_token_model: Option<String>,
    #[serde(default)]
    fallback: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawSettings {
    #[serde(default)]
    token: RawTokenSettings,
}

#[derive(Debug, Deserialize, Default)]
struct RawTokenSettings {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    context_history: Option<usize>,
}

/// Parse raw YAML text into a [`TeamSpec`], without validation.
pub(crate) fn parse(text: &str) -> Result<RawSpec, SpecError> {
    Ok(serde_yaml::from_str(text)?)
}

/// Convert a parsed raw document into a validated [`TeamSpec`], optionally
/// overriding the declared instance name (used by the manager to restore
/// named instances of a shared spec).
pub(crate) fn into_team_spec(raw: RawSpec, name_override: Option<&str>) -> Result<TeamSpec, SpecError> {
    if raw.roles.is_empty() {
        return Err(SpecError::Validation("team spec has no roles".into()));
    }

    let mut roles = HashMap::with_capacity(raw.roles.len());
    for (role_name, raw_role) in raw.roles {
        let visibility = match raw_role.visibility.as_deref() {
            None | Some("internal") => Visibility::Internal,
            Some("client") => Visibility::Client,
            Some(other) => {
                return Err(SpecError::Validation(format!(
                    "role {role_name}: unknown visibility {other:?}"
                )))
            }
        };
        if raw_role.count == 0 {
            return Err(SpecError::Validation(format!(
                "role {role_name}: count must be at least 1"
            )));
        }
        let role = Role {
            name: role_name.clone(),
            title: raw_role.title,
            visibility,
            count: raw_role.count,
            display_name: raw_role.name,
            display_names: raw_role.names,
            persona: raw_role.persona,
            persona_condensed: raw_role.persona_condensed,
            responsibilities: raw_role.responsibilities,
            can_delegate: raw_role.can_delegate,
            reports_to: raw_role.reports_to,
            tools: raw_role.tools,
            model: ModelConfig {
                provider: raw_role.model.provider,
                model: raw_role.model.model,
                temperature: raw_role.model.temperature,
                max_tokens: raw_role.model.max_tokens,
                low_token_model: raw_role.model.low_token_model,
                fallback: raw_role.model.fallback,
            },
        };
        roles.insert(role_name, role);
    }

    // Every can_delegate/reports_to reference must name a real role.
    for role in roles.values() {
        for target in &role.can_delegate {
            if !roles.contains_key(target) {
                return Err(SpecError::Validation(format!(
                    "role {} delegates to unknown role {target}",
                    role.name
                )));
            }
        }
        if let Some(reports_to) = &role.reports_to {
            if !roles.contains_key(reports_to) {
                return Err(SpecError::Validation(format!(
                    "role {} reports to unknown role {reports_to}",
                    role.name
                )));
            }
        }
    }

    let mut client_facing = raw.client_facing;
    for name in &client_facing {
        if !roles.contains_key(name) {
            return Err(SpecError::Validation(format!(
                "client_facing names unknown role {name}"
            )));
        }
    }
    if client_facing.is_empty() {
        client_facing = roles
            .values()
            .filter(|r| r.visibility == Visibility::Client)
            .map(|r| r.name.clone())
            .collect();
        client_facing.sort();
    }

    let mode = match raw.settings.token.mode.as_deref() {
        None | Some("normal") => TokenMode::Normal,
        Some("low") => TokenMode::Low,
        Some("minimal") => TokenMode::Minimal,
        Some(other) => {
            return Err(SpecError::Validation(format!("unknown token mode {other:?}")))
        }
    };

    Ok(TeamSpec {
        api_version: raw.api_version,
        kind: raw.kind,
        name: name_override.unwrap_or(&raw.metadata.name).to_string(),
        client_facing,
        roles,
        token_settings: TokenSettings {
            mode,
            max_tokens: raw.settings.token.max_tokens,
            context_history: raw.settings.token.context_history,
        },
    })
}
