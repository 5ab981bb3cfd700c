//! Error types shared across the analysis pipeline.
//!
//! Resolution failures are ordinary values: a candidate that does not
//! resolve is simply not registered. Everything else here is terminal for
//! the invocation that raised it.

use thiserror::Error;

/// Errors raised while normalizing an authentic domain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Empty domain")]
    Empty,

    #[error("Invalid domain format: {0}")]
    InvalidFormat(String),

    #[error("Not a domain name (IP literal): {0}")]
    NotADomain(String),

    #[error("IDNA conversion failed for {domain}: {reason}")]
    Idna { domain: String, reason: String },
}

/// Errors raised by the domain decomposer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecompositionError {
    #[error("No recognized TLD in {0}")]
    NoRecognizedTld(String),

    #[error("No base label precedes the TLD sequence in {0}")]
    MissingBaseLabel(String),

    #[error("Decomposition of {domain} re-joins to {rejoined}")]
    Mismatch { domain: String, rejoined: String },
}

/// Why a single DNS lookup did not confirm a candidate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionFailure {
    #[error("no such domain")]
    NxDomain,

    #[error("no answer")]
    NoAnswer,

    #[error("no reachable nameserver")]
    NoNameservers,

    #[error("lookup timed out")]
    Timeout,

    #[error("resolution error: {0}")]
    Other(String),
}

/// Failures of the storage collaborator.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Flush failed after {attempts} attempts with {pending} entries pending")]
    FlushFailed { pending: usize, attempts: u32 },
}

/// Errors loading or validating [`crate::config::AnalysisConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Terminal failure of one analysis invocation.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Decomposition(#[from] DecompositionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Background analysis task failed: {0}")]
    Background(String),
}
