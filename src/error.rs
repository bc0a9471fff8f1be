//! Error types for trueno-flow operations.

use std::io;
use thiserror::Error;

use crate::executive::StageId;
use crate::request::Pass;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or executing a pipeline.
///
/// Programming-contract violations (double destruction, negative reference
/// counts, mismatched key types) are not represented here: they are bugs in a
/// collaborator and trip assertions instead.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error (config file operations, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A pass handler declined to run, e.g. because its upstream state is unusable.
    #[error("stage declined {pass:?} pass: {reason}")]
    StageDeclined {
        /// The pass that was declined.
        pass: Pass,
        /// Human-readable reason supplied by the handler.
        reason: String,
    },

    /// A pass failed on a specific stage; wraps the handler's error.
    #[error("{pass:?} pass failed at stage {stage} ({name}): {source}")]
    PassFailed {
        /// Stage whose handler failed.
        stage: StageId,
        /// Class name of the failing algorithm.
        name: String,
        /// The pass being executed.
        pass: Pass,
        /// Underlying error.
        #[source]
        source: Box<Error>,
    },

    /// Execution stopped because an abort was requested.
    #[error("update aborted before stage {stage} completed")]
    Aborted {
        /// First stage that did not complete.
        stage: StageId,
    },

    /// The stage id does not belong to this pipeline.
    #[error("unknown stage {0}")]
    UnknownStage(StageId),

    /// The stage's algorithm is not of the requested type.
    #[error("stage {stage} does not hold a {expected}")]
    AlgorithmType {
        /// Stage being addressed.
        stage: StageId,
        /// Requested algorithm type.
        expected: &'static str,
    },

    /// A port index was out of range for the stage.
    #[error("stage {stage} has no {direction} port {port}")]
    PortOutOfRange {
        /// Stage being addressed.
        stage: StageId,
        /// "input" or "output".
        direction: &'static str,
        /// Requested port index.
        port: usize,
    },

    /// A connection request was rejected.
    #[error("invalid connection: {0}")]
    InvalidConnection(String),

    /// Connecting the stages would create a data-flow cycle.
    #[error("connecting stage {producer} to stage {consumer} would create a cycle")]
    CycleDetected {
        /// Upstream end of the rejected edge.
        producer: StageId,
        /// Downstream end of the rejected edge.
        consumer: StageId,
    },

    /// An input port received data of a type it does not accept.
    #[error("stage {stage} input port {port} requires {expected}, got {actual}")]
    InputTypeMismatch {
        /// Consuming stage.
        stage: StageId,
        /// Input port index.
        port: usize,
        /// Required data type name.
        expected: String,
        /// Data type name actually produced.
        actual: String,
    },

    /// A required input port has no connection.
    #[error("stage {stage} input port {port} is required but not connected")]
    MissingInput {
        /// Stage missing an input.
        stage: StageId,
        /// Input port index.
        port: usize,
    },

    /// Configuration parsing error with line number.
    #[error("configuration error at line {line}: {message}")]
    ConfigParse {
        /// Line number where the error occurred (1-indexed).
        line: usize,
        /// Error message describing the issue.
        message: String,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {0}")]
    ConfigNotFound(String),

    /// Invalid configuration value.
    #[error("invalid configuration value for '{key}': {message}")]
    ConfigInvalid {
        /// The configuration key with invalid value.
        key: String,
        /// Error message describing why the value is invalid.
        message: String,
    },
}

impl Error {
    /// Shorthand for a handler refusing a pass.
    pub fn declined(pass: Pass, reason: impl Into<String>) -> Self {
        Error::StageDeclined { pass, reason: reason.into() }
    }

    /// Returns true if this error (or the error it wraps) is an abort.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        match self {
            Error::Aborted { .. } => true,
            Error::PassFailed { source, .. } => source.is_aborted(),
            _ => false,
        }
    }
}
