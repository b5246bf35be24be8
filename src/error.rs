use std::fmt;
use std::io;

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised by the storage lifecycle and the rule engine.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Creating or loading a storage root (or one of its files) failed.
    #[error("failed to open graph storage: {0}")]
    Opening(String),
    /// Persisting the metadata store failed.
    #[error("failed to flush graph storage: {0}")]
    Flushing(String),
    /// One or more failures while closing a storage root.
    #[error("failed to close graph storage: {0}")]
    Closing(CloseErrors),
    /// One or more graph rules failed while handling an event.
    #[error("graph rule error: {0}")]
    Rule(RuleErrors),
    /// Invalid data was handed to a staging operation.
    #[error("invalid data: {0}")]
    InvalidData(String),
    /// A structural write was attempted through a read-only manager.
    #[error("read-only graph manager: {0}")]
    ReadOnly(&'static str),
    /// A persisted file failed format or checksum validation.
    #[error("corruption detected: {0}")]
    Corruption(String),
    /// Raw I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A single failed rule invocation.
#[derive(Debug)]
pub struct RuleFailure {
    /// Name of the rule that failed.
    pub rule: String,
    /// The error returned by the rule handler.
    pub error: GraphError,
}

/// Aggregate of every rule failure seen during one dispatch.
#[derive(Debug, Default)]
pub struct RuleErrors {
    failures: Vec<RuleFailure>,
}

impl RuleErrors {
    pub(crate) fn push(&mut self, rule: impl Into<String>, error: GraphError) {
        self.failures.push(RuleFailure {
            rule: rule.into(),
            error,
        });
    }

    /// Returns true when no rule failed.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Individual failures in the order they were observed.
    pub fn failures(&self) -> &[RuleFailure] {
        &self.failures
    }
}

impl fmt::Display for RuleErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, failure) in self.failures.iter().enumerate() {
            if idx > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", failure.error)?;
        }
        Ok(())
    }
}

/// Aggregate of every failure seen while closing a storage root.
#[derive(Debug)]
pub struct CloseErrors {
    store: String,
    causes: Vec<GraphError>,
}

impl CloseErrors {
    pub(crate) fn new(store: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            causes: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, cause: GraphError) {
        self.causes.push(cause);
    }

    /// Returns true when every close step succeeded.
    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }

    /// Name of the storage root being closed.
    pub fn store(&self) -> &str {
        &self.store
    }

    /// Underlying errors, metadata flush first.
    pub fn causes(&self) -> &[GraphError] {
        &self.causes
    }
}

impl fmt::Display for CloseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.store)?;
        for (idx, cause) in self.causes.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{cause}")?;
        }
        Ok(())
    }
}
