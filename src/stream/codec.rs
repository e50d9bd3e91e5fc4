//! Wire records and the codecs that frame them.

use std::fmt;
use std::io::{BufRead, Read, Write};
use std::marker::PhantomData;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::{NodeId, NodeRef};
use crate::stream::error::CodecError;

/// One serialized node: `{id, parentID, data}`.
///
/// `parent_id == 0` marks a node without parent. Tree shape is rebuilt from
/// these two keys alone, so record order on the wire does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<D> {
    pub id: NodeId,
    #[serde(rename = "parentID")]
    pub parent_id: NodeId,
    pub data: D,
}

impl<'a, T> From<NodeRef<'a, T>> for Record<&'a T> {
    fn from(node: NodeRef<'a, T>) -> Self {
        Record {
            id: node.id(),
            parent_id: node.parent_id(),
            data: node.data(),
        }
    }
}

/// Encodes and decodes single records of payload type `T`.
///
/// Each encoded record must be self-delimiting: `decode` reads exactly one
/// record from the source and returns `Ok(None)` at a clean end of input.
pub trait RecordCodec<T> {
    fn encode(&self, record: Record<&T>, sink: &mut dyn Write) -> Result<(), CodecError>;

    fn decode(&self, source: &mut dyn BufRead) -> Result<Option<Record<T>>, CodecError>;
}

/// How JSON records are delimited on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// One JSON document per line.
    #[default]
    JsonLines,
    /// Big-endian `u32` byte length followed by the JSON document.
    LengthDelimited,
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::JsonLines => f.write_str("json-lines"),
            Framing::LengthDelimited => f.write_str("length-delimited"),
        }
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json-lines" | "json_lines" | "jsonl" => Ok(Framing::JsonLines),
            "length-delimited" | "length_delimited" => Ok(Framing::LengthDelimited),
            other => Err(format!("unknown framing: {other}")),
        }
    }
}

pub const DEFAULT_MAX_RECORD_BYTES: usize = 16 * 1024 * 1024;

/// serde_json codec for any `Serialize + DeserializeOwned` payload.
pub struct JsonCodec<T> {
    framing: Framing,
    max_record_bytes: usize,
    payload: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for JsonCodec<T> {}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec")
            .field("framing", &self.framing)
            .field("max_record_bytes", &self.max_record_bytes)
            .finish()
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new(Framing::default())
    }
}

impl<T> JsonCodec<T> {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            payload: PhantomData,
        }
    }

    pub fn json_lines() -> Self {
        Self::new(Framing::JsonLines)
    }

    pub fn length_delimited() -> Self {
        Self::new(Framing::LengthDelimited)
    }

    /// Upper bound for a single decoded record.
    pub fn with_max_record_bytes(mut self, limit: usize) -> Self {
        self.max_record_bytes = limit;
        self
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    fn check_len(&self, len: usize) -> Result<(), CodecError> {
        if len > self.max_record_bytes {
            return Err(CodecError::RecordTooLarge {
                len,
                limit: self.max_record_bytes,
            });
        }
        Ok(())
    }

    /// Next non-blank line, without its terminator.
    ///
    /// At most `max_record_bytes` plus a `\r\n` terminator is read per line.
    fn read_line(&self, source: &mut dyn BufRead) -> Result<Option<Vec<u8>>, CodecError> {
        let limit = (self.max_record_bytes as u64).saturating_add(2);
        loop {
            let mut line = Vec::new();
            let read = Read::take(&mut *source, limit).read_until(b'\n', &mut line)?;
            if read == 0 {
                return Ok(None);
            }
            let terminated = line.last() == Some(&b'\n');
            if terminated {
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
            }
            self.check_len(line.len())?;
            if !line.iter().all(u8::is_ascii_whitespace) {
                return Ok(Some(line));
            }
        }
    }

    fn read_frame(&self, source: &mut dyn BufRead) -> Result<Option<Vec<u8>>, CodecError> {
        let mut prefix = [0u8; 4];
        let mut filled = 0;
        while filled < prefix.len() {
            let n = source.read(&mut prefix[filled..])?;
            if n == 0 {
                return match filled {
                    0 => Ok(None),
                    _ => Err(CodecError::Truncated),
                };
            }
            filled += n;
        }
        let len = u32::from_be_bytes(prefix) as usize;
        self.check_len(len)?;
        let mut body = vec![0u8; len];
        source.read_exact(&mut body).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => CodecError::Truncated,
            _ => CodecError::Io(e),
        })?;
        Ok(Some(body))
    }
}

impl<T> RecordCodec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, record: Record<&T>, sink: &mut dyn Write) -> Result<(), CodecError> {
        // Encode fully before writing so a failing payload leaves no partial record.
        let body = serde_json::to_vec(&record)?;
        match self.framing {
            Framing::JsonLines => {
                sink.write_all(&body)?;
                sink.write_all(b"\n")?;
            }
            Framing::LengthDelimited => {
                let len = u32::try_from(body.len()).map_err(|_| CodecError::RecordTooLarge {
                    len: body.len(),
                    limit: u32::MAX as usize,
                })?;
                sink.write_all(&len.to_be_bytes())?;
                sink.write_all(&body)?;
            }
        }
        Ok(())
    }

    fn decode(&self, source: &mut dyn BufRead) -> Result<Option<Record<T>>, CodecError> {
        let body = match self.framing {
            Framing::JsonLines => self.read_line(source)?,
            Framing::LengthDelimited => self.read_frame(source)?,
        };
        match body {
            Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
            None => Ok(None),
        }
    }
}
