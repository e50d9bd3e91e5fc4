//! Stream-level errors (encoding, decoding and the producer handoff)

use thiserror::Error;

use crate::domain::NodeId;

/// Failure of a single record encode or decode.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record of {len} bytes exceeds limit of {limit} bytes")]
    RecordTooLarge { len: usize, limit: usize },

    #[error("input ended inside a record")]
    Truncated,
}

/// Failure of a whole serialize or deserialize run.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("error serializing node {id}: {source}")]
    Encode {
        id: NodeId,
        #[source]
        source: CodecError,
    },

    #[error("error deserializing record {record}: {source}")]
    Decode {
        record: usize,
        #[source]
        source: CodecError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("reader closed after {written} records")]
    Cancelled { written: usize },

    #[error("producer stopped without reporting completion")]
    ProducerLost,
}

/// Result type for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;
