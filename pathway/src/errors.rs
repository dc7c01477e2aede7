//! Error taxonomy for graph construction, evaluation and healing.
//!
//! Failures are tagged rather than typed by exception class: the healing
//! controller switches on [`ErrorKind`] to decide whether another attempt
//! with a wider distrust window is worthwhile.

use std::sync::Arc;

/// Result alias used throughout the crate.
pub type PathwayResult<T> = Result<T, PathwayError>;

/// Errors produced while building or evaluating pathways.
///
/// `Clone` is required because a single in-flight evaluation may be awaited
/// by several branches at once.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PathwayError {
    /// A value was produced but rejected. Expected; drives healing forward.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An evaluator (network, database, decoding) failed.
    #[error("transport error: {0}")]
    Transport(Arc<anyhow::Error>),

    /// An evaluator declared the failure unrecoverable.
    #[error("fatal error: {0}")]
    Fatal(String),

    /// Misuse of the graph-building API.
    #[error("construction error: {0}")]
    Construction(String),

    /// Invalid configuration or environment.
    #[error("configuration error: {0}")]
    Config(String),

    /// A persistent cache operation failed.
    #[error("cache error: {0}")]
    Cache(String),

    /// Annotation added by a top-level evaluation.
    #[error("evaluation of '{pipeline}' failed (distrust window {window}): {source}")]
    Evaluation {
        pipeline: String,
        window: usize,
        source: Box<PathwayError>,
    },

    /// Every distrust window was tried and none produced an accepted value.
    #[error("exhausted healing depth {depth} for '{pipeline}'")]
    Exhausted { pipeline: String, depth: usize },
}

/// Tag of a [`PathwayError`], with annotations looked through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    Fatal,
    Construction,
    Config,
    Cache,
    Exhausted,
}

impl PathwayError {
    /// Wrap any error as a transport failure.
    pub fn transport(err: impl Into<anyhow::Error>) -> Self {
        Self::Transport(Arc::new(err.into()))
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn construction(msg: impl Into<String>) -> Self {
        Self::Construction(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Fatal(_) => ErrorKind::Fatal,
            Self::Construction(_) => ErrorKind::Construction,
            Self::Config(_) => ErrorKind::Config,
            Self::Cache(_) => ErrorKind::Cache,
            Self::Evaluation { source, .. } => source.kind(),
            Self::Exhausted { .. } => ErrorKind::Exhausted,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// Whether another healing attempt may succeed after this failure.
    pub fn is_healable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::Transport | ErrorKind::Cache
        )
    }

    /// Strip evaluation annotations.
    pub fn root(&self) -> &PathwayError {
        match self {
            Self::Evaluation { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for PathwayError {
    fn from(err: serde_json::Error) -> Self {
        Self::transport(err)
    }
}

impl From<std::io::Error> for PathwayError {
    fn from(err: std::io::Error) -> Self {
        Self::transport(err)
    }
}

/// Raise the distinguished "validation failed" condition from an evaluator.
///
/// ```
/// use pathway::errors::{validation_failed, PathwayResult};
///
/// fn check(status: u16) -> PathwayResult<()> {
///     if status != 200 {
///         return Err(validation_failed(format!("unexpected status {status}")));
///     }
///     Ok(())
/// }
/// assert!(check(404).unwrap_err().is_validation());
/// ```
pub fn validation_failed(reason: impl Into<String>) -> PathwayError {
    PathwayError::Validation(reason.into())
}
