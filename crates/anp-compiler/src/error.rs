//! Error types for policy compilation.
//!
//! Four classes of failure exist and none of them is transient:
//!
//! - [`ParseError`]: an input value outside the closed vocabularies
//!   (protocols, actions, directions).
//! - [`CompileError`]: an invariant breach reaching the compiler. It aborts
//!   compilation of the offending policy only.
//! - [`DocumentError`]: a policy document that does not describe valid
//!   policies.
//! - [`ConfigError`]: unusable compiler configuration or unreadable files.
//!
//! Priority conflicts are reported separately through
//! [`crate::priority::PriorityConflicts`] so that every conflict of a
//! snapshot is surfaced in one pass.

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::priority::PriorityConflicts;
use crate::types::{Direction, PolicyFlavor, RuleAction};

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Parse failures for closed input vocabularies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unsupported protocol: {0} (expected TCP, UDP or SCTP)")]
    InvalidProtocol(String),

    #[error("unknown rule action: {0}")]
    InvalidAction(String),

    #[error("unknown rule direction: {0}")]
    InvalidDirection(String),
}

/// Compilation failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
pub enum CompileError {
    /// A rule carries an action its policy flavor does not allow.
    #[error(
        "illegal action {action} for {flavor} policy {policy} ({direction} rule {rule_index})"
    )]
    IllegalAction {
        /// Owning policy name.
        policy: String,
        /// Flavor of the owning policy.
        flavor: PolicyFlavor,
        /// Direction of the offending rule.
        direction: Direction,
        /// Index of the offending rule within its direction.
        rule_index: usize,
        /// The rejected action.
        action: RuleAction,
    },
}

/// Failures converting a policy document into policies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// A standard policy without a priority.
    #[error("standard policy {policy} has no priority")]
    MissingPriority { policy: String },

    /// A baseline policy with a priority.
    #[error("baseline policy {policy} must not set a priority")]
    UnexpectedPriority { policy: String },

    /// A policy without a name.
    #[error("policy at position {position} has an empty name")]
    EmptyName { position: usize },

    /// Two policies of one flavor share a name.
    #[error("{flavor} policy {policy} is defined more than once")]
    DuplicateName {
        flavor: PolicyFlavor,
        policy: String,
    },

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Both address families are disabled.
    #[error("at least one of ipv4_mode and ipv6_mode must be enabled")]
    NoAddressFamily,

    /// Controller name is empty.
    #[error("controller name must not be empty")]
    EmptyController,

    /// Failed to read a configuration or policy file.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that could not be read.
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File content is not valid YAML for the expected schema.
    #[error("failed to parse {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// File content is not valid JSON for the expected schema.
    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level crate error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Priority(#[from] PriorityConflicts),
}
