//! Error types for strand construction and export.

use thiserror::Error;

use crate::nesting::NestingError;
use crate::output::SinkError;
use crate::provider::ObjectId;

/// Bounds and shape errors raised by strand and cylinder accessors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrandError {
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("motion key {key} out of range ({keys} keys)")]
    KeyOutOfRange { key: usize, keys: usize },

    #[error("strand {strand} has no vertices")]
    EmptyStrand { strand: usize },
}

/// Errors that can occur while exporting an object.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("export aborted")]
    Aborted,

    #[error("unknown object {0}")]
    UnknownObject(ObjectId),

    #[error("no strand sample for object {object} at time {time}")]
    MissingSample { object: ObjectId, time: f64 },

    #[error("object {0} has no master shape that can be instanced")]
    NoValidMasters(ObjectId),

    #[error("nesting error: {0}")]
    Nesting(#[from] NestingError),

    #[error("strand error: {0}")]
    Strand(#[from] StrandError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;
