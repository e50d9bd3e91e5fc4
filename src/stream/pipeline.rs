//! Streaming serialize/deserialize of a [`Tree`].
//!
//! Serializing runs a producer thread that walks the tree and hands each
//! encoded record to the consumer through a rendezvous channel: the producer
//! stays at most one record ahead of the reader. Dropping the reader closes
//! the channel, which wakes a blocked producer and stops the walk.

use std::io::{self, BufReader, Read, Write};
use std::thread::Scope;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, instrument, trace};

use crate::domain::{NodeRef, Order, Tree};
use crate::stream::codec::{Record, RecordCodec};
use crate::stream::error::{StreamError, StreamResult};

/// Byte stream of encoded records produced by [`Tree::serialize`].
///
/// Reaches end of input once the producer has finished or failed.
pub struct RecordReader {
    records: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl RecordReader {
    fn new(records: Receiver<Vec<u8>>) -> Self {
        Self {
            records,
            chunk: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for RecordReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.chunk.len() {
            match self.records.recv() {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// One-shot completion signal of a serialize run.
///
/// Carries the number of records written, or the error that stopped the
/// walk. Drain the [`RecordReader`] before waiting when the channel is
/// unbuffered, otherwise the producer can never finish.
pub struct Completion {
    outcome: Receiver<StreamResult<usize>>,
    received: Option<StreamResult<usize>>,
}

impl Completion {
    fn new(outcome: Receiver<StreamResult<usize>>) -> Self {
        Self {
            outcome,
            received: None,
        }
    }

    pub fn wait(self) -> StreamResult<usize> {
        match self.received {
            Some(outcome) => outcome,
            None => self.outcome.recv().unwrap_or(Err(StreamError::ProducerLost)),
        }
    }

    /// The outcome if the producer has already finished.
    ///
    /// The outcome stays available to a later [`wait`](Self::wait).
    pub fn try_wait(&mut self) -> Option<&StreamResult<usize>> {
        if self.received.is_none() {
            self.received = self.outcome.try_recv().ok();
        }
        self.received.as_ref()
    }
}

fn encode_node<T, C>(codec: &C, node: NodeRef<'_, T>, sink: &mut dyn Write) -> StreamResult<()>
where
    C: RecordCodec<T>,
{
    codec
        .encode(Record::from(node), sink)
        .map_err(|source| StreamError::Encode {
            id: node.id(),
            source,
        })
}

impl<T> Tree<T> {
    /// Stream the tree as encoded records in `order`.
    ///
    /// Records are handed over one at a time through an unbuffered channel.
    /// The first encoding error ends the stream and is reported through the
    /// returned [`Completion`]; records already read are not retracted.
    pub fn serialize<'scope, 'env, C>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        order: Order,
        codec: C,
    ) -> (RecordReader, Completion)
    where
        T: Sync,
        C: RecordCodec<T> + Send + 'scope,
    {
        self.serialize_buffered(scope, order, codec, 0)
    }

    /// Like [`serialize`](Self::serialize) with up to `capacity` encoded
    /// records queued ahead of the reader.
    #[instrument(level = "trace", skip(self, scope, codec))]
    pub fn serialize_buffered<'scope, 'env, C>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        order: Order,
        codec: C,
        capacity: usize,
    ) -> (RecordReader, Completion)
    where
        T: Sync,
        C: RecordCodec<T> + Send + 'scope,
    {
        let (records_tx, records_rx) = crossbeam_channel::bounded(capacity);
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);

        scope.spawn(move || {
            let outcome = self.produce(order, &codec, records_tx);
            match &outcome {
                Ok(written) => debug!(written, "serialize finished"),
                Err(e) => debug!(error = %e, "serialize stopped"),
            }
            // The completion receiver may already be gone; nobody to tell.
            let _ = done_tx.send(outcome);
        });

        (RecordReader::new(records_rx), Completion::new(done_rx))
    }

    fn produce<C>(&self, order: Order, codec: &C, records: Sender<Vec<u8>>) -> StreamResult<usize>
    where
        C: RecordCodec<T>,
    {
        let mut written = 0;
        for node in self.traverse(order) {
            let mut chunk = Vec::new();
            encode_node(codec, node, &mut chunk)?;
            records
                .send(chunk)
                .map_err(|_| StreamError::Cancelled { written })?;
            trace!(id = node.id(), "record handed over");
            written += 1;
        }
        Ok(written)
    }

    /// Write every node to `sink` in `order` on the calling thread.
    #[instrument(level = "trace", skip(self, codec, sink))]
    pub fn write_records<C, W>(&self, order: Order, codec: &C, mut sink: W) -> StreamResult<usize>
    where
        C: RecordCodec<T>,
        W: Write,
    {
        let mut written = 0;
        for node in self.traverse(order) {
            encode_node(codec, node, &mut sink)?;
            written += 1;
        }
        sink.flush()?;
        Ok(written)
    }

    /// Rebuild a tree from a stream of records.
    ///
    /// Every record is replayed through [`add`](Self::add) in source order.
    /// Records that `add` refuses are skipped. A malformed record aborts the
    /// run and the partial tree is dropped.
    #[instrument(level = "trace", skip(source, codec))]
    pub fn deserialize<R, C>(source: R, codec: &C) -> StreamResult<Self>
    where
        R: Read,
        C: RecordCodec<T>,
    {
        let mut reader = BufReader::new(source);
        let mut tree = Tree::new();
        let mut record = 0;
        loop {
            match codec.decode(&mut reader) {
                Ok(Some(Record {
                    id,
                    parent_id,
                    data,
                })) => {
                    let outcome = tree.add(id, parent_id, data);
                    if !outcome.added() {
                        debug!(id, parent_id, ?outcome, "record not added");
                    }
                    record += 1;
                }
                Ok(None) => {
                    debug!(records = record, nodes = tree.len(), "deserialize finished");
                    return Ok(tree);
                }
                Err(source) => return Err(StreamError::Decode { record, source }),
            }
        }
    }
}
