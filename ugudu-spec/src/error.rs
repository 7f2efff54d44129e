//! [`SpecError`] — everything that can go wrong loading a [`crate::TeamSpec`].

/// Errors from parsing or validating a team specification.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    /// Could not read the spec file from disk.
    #[error("failed to read spec file {path}: {source}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The YAML body did not parse.
    #[error("failed to parse spec YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// The parsed document failed structural validation.
    #[error("invalid team spec: {0}")]
    Validation(String),
}
