#![deny(missing_docs)]
//! YAML team-specification loader for ugudu.
//!
//! Thin by design (§6): parse → env-substitute → `serde_yaml` into a raw
//! shape → validate → [`TeamSpec`]. No retry logic, no caching, no
//! hot-reload — the core only ever sees the parsed, validated struct.

mod env;
mod error;
mod raw;
mod types;

pub use error::SpecError;
pub use types::{ModelConfig, Role, TeamSpec, TokenMode, TokenSettings, Visibility};

/// Parse a team spec from YAML text already read into memory.
///
/// Applies `${VAR}` / `${VAR:-default}` environment substitution to the
/// raw text before parsing.
///
/// # Errors
///
/// Returns [`SpecError::Parse`] if the YAML doesn't parse, or
/// [`SpecError::Validation`] if the parsed document references an unknown
/// role, declares zero roles, or otherwise fails structural checks.
pub fn load_str(text: &str) -> Result<TeamSpec, SpecError> {
    load_str_named(text, None)
}

/// Same as [`load_str`], but overrides the declared `metadata.name` with
/// `name_override` — used by the manager to restore a named instance of a
/// spec shared across teams.
///
/// # Errors
///
/// See [`load_str`].
pub fn load_str_named(text: &str, name_override: Option<&str>) -> Result<TeamSpec, SpecError> {
    let substituted = env::substitute(text);
    let parsed = raw::parse(&substituted)?;
    raw::into_team_spec(parsed, name_override)
}

/// Read a team spec from a YAML file on disk and parse it.
///
/// # Errors
///
/// Returns [`SpecError::Io`] if the file can't be read, otherwise as
/// [`load_str`].
pub fn load_path(path: impl AsRef<std::path::Path>) -> Result<TeamSpec, SpecError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_str(&text)
}
