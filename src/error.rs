//! Crate-wide error type.
//!
//! Graph wiring problems surface at construction time ([`Error::ShapeMismatch`]);
//! everything else surfaces while a step runs. Nothing here is retried.

use crate::ids::DatasetId;
use crate::step::FanoutShape;
use crate::value::ScalarKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{shape:?} step cannot wire {inputs} input shard(s) to {outputs} output shard(s)")]
    ShapeMismatch {
        shape: FanoutShape,
        inputs: usize,
        outputs: usize,
    },

    #[error("dataset {0} belongs to a different flow")]
    ForeignDataset(DatasetId),

    #[error("dataset {0} already has a producing step")]
    AlreadyProduced(DatasetId),

    #[error("dataset {0} has no producing step")]
    Unproduced(DatasetId),

    #[error("malformed row: {0}")]
    MalformedRow(String),

    #[error("cannot coerce {from:?} value into a {to:?} slot")]
    TypeMismatch { from: ScalarKind, to: ScalarKind },

    #[error("key field {index} out of range for a row with {fields} field(s)")]
    KeyIndexOutOfRange { index: usize, fields: usize },

    #[error("field indexes are 1-based, got 0")]
    InvalidKeyIndex,

    #[error("format template {template:?}: {message}")]
    Format { template: String, message: String },

    #[error("output handler for shard {shard} failed")]
    HandlerFailure {
        shard: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("shard {shard} stream cancelled")]
    Cancelled { shard: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRow(message.into())
    }

    pub fn handler_failure(shard: usize, source: anyhow::Error) -> Self {
        Self::HandlerFailure {
            shard,
            source: source.into(),
        }
    }

    /// True when the error was caused by the aggregator cancelling a stream.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
