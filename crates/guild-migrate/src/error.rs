//! Error types for the migration library.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// How the engine must treat a failed adapter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterErrorKind {
    /// Aborts the whole run (authorization failure, contract violation).
    Fatal,
    /// Rate limit, timeout, 5xx. Retried under the retry policy.
    Retryable,
    /// Permanent failure of a single request (validation error, 404...).
    /// Never retried, recorded as a per-item failure.
    Rejected,
}

impl fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AdapterErrorKind::Fatal => "fatal",
            AdapterErrorKind::Retryable => "retryable",
            AdapterErrorKind::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

/// Error returned by a destination platform adapter (or the source reader's
/// HTTP layer).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub message: String,
    /// Explicit wait requested by the platform (e.g. HTTP 429 `retry_after`).
    pub retry_after: Option<Duration>,
}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Fatal, message)
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Retryable, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Rejected, message)
    }

    /// Rate-limit signal, optionally carrying the platform's requested wait.
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            kind: AdapterErrorKind::Retryable,
            message: message.into(),
            retry_after,
        }
    }

    /// The engine handed the adapter something it never produced.
    pub fn contract_violation(message: impl Into<String>) -> Self {
        Self::fatal(format!("contract violation: {}", message.into()))
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == AdapterErrorKind::Fatal
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == AdapterErrorKind::Retryable
    }

    /// Promote any error to fatal (used where nothing downstream can proceed).
    pub fn into_fatal(mut self) -> Self {
        self.kind = AdapterErrorKind::Fatal;
        self
    }
}

/// Result alias for adapter operations.
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The source server could not be read.
    #[error("Source read error: {0}")]
    SourceRead(String),

    /// A destination adapter call failed outside a migration run.
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// The run hit a fatal error and stopped.
    #[error("Migration aborted during {stage}: {reason}")]
    Aborted { stage: String, reason: String },

    /// No adapter registered under the requested platform identifier.
    #[error("Unknown destination platform '{name}' (available: {available})")]
    UnknownPlatform { name: String, available: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a SourceRead error from anything displayable.
    pub fn source_read(message: impl fmt::Display) -> Self {
        MigrateError::SourceRead(message.to_string())
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::UnknownPlatform { .. } => 2,
            MigrateError::SourceRead(_) => 3,
            MigrateError::Adapter(_) => 4,
            MigrateError::Aborted { .. } => 5,
            MigrateError::Io(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => 1,
        }
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
