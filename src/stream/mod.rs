//! Record stream persistence
//!
//! A tree is persisted as a flat sequence of `{id, parentID, data}` records
//! with no header or footer. The codec's own framing delimits records.

pub mod codec;
pub mod error;
pub mod pipeline;

pub use codec::{Framing, JsonCodec, Record, RecordCodec, DEFAULT_MAX_RECORD_BYTES};
pub use error::{CodecError, StreamError, StreamResult};
pub use pipeline::{Completion, RecordReader};
