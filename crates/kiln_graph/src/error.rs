//! Error types for graph construction and script emission.

use kiln_config::ConfigError;
use std::path::PathBuf;

/// Errors raised while compiling a job into a build script.
///
/// Every variant is detected before the script is written; a failed
/// compilation never leaves a partial script behind.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// A mandatory option is absent from every scope.
    #[error("missing required option '{key}' for {scope}")]
    MissingRequiredOption {
        /// The option key.
        key: String,
        /// What required it (the flow, or a stage such as `vpr#1`).
        scope: String,
    },

    /// An option selected a tool, architecture, engine or board that is not
    /// supported.
    #[error("unsupported {what} '{value}' (expected one of: {expected})")]
    UnsupportedVariant {
        /// What kind of selection failed (e.g. `place-and-route engine`).
        what: &'static str,
        /// The value that was given.
        value: String,
        /// The accepted values.
        expected: String,
    },

    /// An artifact is consumed but produced by no earlier node and not
    /// supplied by the job.
    #[error("unresolved reference to '{name}' from {referrer}")]
    UnresolvedReference {
        /// The artifact name.
        name: String,
        /// The node or target that references it.
        referrer: String,
    },

    /// A generation-time placeholder has no binding.
    #[error("undefined variable '@{name}@' in {referrer}")]
    UndefinedVariable {
        /// The variable name.
        name: String,
        /// Where the placeholder appears.
        referrer: String,
    },

    /// Two bindings share a name with conflicting values or namespaces.
    #[error("duplicate binding '{name}' (declared by {first} and {second})")]
    DuplicateBinding {
        /// The binding name.
        name: String,
        /// The first declaration.
        first: String,
        /// The conflicting declaration.
        second: String,
    },

    /// A binding name is not a valid identifier.
    #[error("invalid binding name '{name}': {reason}")]
    InvalidBinding {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Two nodes declare the same output.
    #[error("target '{name}' is produced by both {first} and {second}")]
    DuplicateTarget {
        /// The artifact name.
        name: String,
        /// The first producer.
        first: String,
        /// The second producer.
        second: String,
    },

    /// An artifact name still contains an execution-time placeholder, so its
    /// producer cannot be checked.
    #[error("artifact name '{name}' in {referrer} is only known at execution time")]
    DeferredArtifact {
        /// The artifact name.
        name: String,
        /// The node that declares it.
        referrer: String,
    },

    /// A name or value contains a character that would change the meaning
    /// of the make script.
    #[error("{what} {text:?} in {referrer} contains {found:?}, which make would misread")]
    UnsafeText {
        /// What was checked (an artifact name, a command, a value).
        what: &'static str,
        /// The offending text.
        text: String,
        /// Where it appears.
        referrer: String,
        /// The first rejected character.
        found: char,
    },

    /// The chain specification is malformed.
    #[error("invalid chain: {0}")]
    InvalidChain(String),

    /// A tool adapter returned a partially-formed stage.
    #[error("stage {stage} is incomplete: {reason}")]
    IncompleteStage {
        /// The stage identity.
        stage: String,
        /// What is missing.
        reason: String,
    },

    /// A stage needs an input file the job does not supply.
    #[error("{stage} requires at least one {kind} file")]
    MissingInput {
        /// The stage identity.
        stage: String,
        /// The file kind description.
        kind: &'static str,
    },

    /// No node was produced.
    #[error("the flow produced no build rules")]
    EmptyGraph,

    /// A configuration error other than a missing option.
    #[error(transparent)]
    Config(ConfigError),

    /// Writing the script failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// The path being written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl FlowError {
    /// Attaches a scope to a configuration error, keeping missing options
    /// distinguishable from other failures.
    pub fn from_config(err: ConfigError, scope: impl Into<String>) -> Self {
        match err {
            ConfigError::MissingRequiredOption { key } => Self::MissingRequiredOption {
                key,
                scope: scope.into(),
            },
            other => Self::Config(other),
        }
    }
}

impl From<ConfigError> for FlowError {
    fn from(err: ConfigError) -> Self {
        Self::from_config(err, "the flow")
    }
}
